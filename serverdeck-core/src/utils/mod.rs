//! 工具函数模块

pub mod url;
pub mod version;
