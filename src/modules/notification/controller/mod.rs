//! 通知模块控制器 / Notification module controllers

pub mod badge;
