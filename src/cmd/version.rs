/// 打印版本信息 / Print version info
pub fn handle_version_command() {
    println!("guidance-rust v{}", env!("CARGO_PKG_VERSION"));
    println!("辅导预约与转介平台后端 / Counseling appointment and referral backend");
}
