// 照片预加载后端库
//
// 本库提供图库客户端的图片预加载功能，包括：
// - API 路由
// - 照片数据模型
// - 预加载缓存服务

pub mod api;
pub mod models;
pub mod services;
