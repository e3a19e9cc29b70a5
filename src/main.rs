use clap::ArgMatches;
use std::error::Error;

use guidance_rust::app_bootstrap::{AppBootstrap, AppConfig};
use guidance_rust::cmd::handle_version_command;
use guidance_rust::command_registry::{build_app, handle_command};
use guidance_rust::{init_commands, init_routes};

#[actix_web::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // 初始化所有模块的命令
    init_commands();

    // 构建命令行应用
    let matches: ArgMatches = build_app().get_matches();

    match matches.subcommand() {
        Some(("server", sub_matches)) => {
            handle_server_command(sub_matches).await?;
        }
        Some(("version", _)) => {
            handle_version_command();
        }
        Some((command_name, sub_matches)) => {
            if let Err(e) = handle_command(command_name, sub_matches) {
                eprintln!("处理命令 '{}' 时出错: {}", command_name, e);
                std::process::exit(1);
            }
        }
        _ => {
            // subcommand_required(true) 下不应到达这里
            eprintln!("未知命令，请使用 --help 查看可用命令");
            std::process::exit(1);
        }
    }

    Ok(())
}

async fn handle_server_command(matches: &ArgMatches) -> Result<(), Box<dyn Error>> {
    // 初始化路由
    init_routes();

    let host = matches
        .get_one::<String>("host")
        .cloned()
        .unwrap_or_else(|| "0.0.0.0".to_string());
    let port: u16 = matches
        .get_one::<String>("port")
        .and_then(|p| p.parse().ok())
        .unwrap_or(3000);
    let workers: Option<usize> = matches
        .get_one::<String>("workers")
        .and_then(|w| w.parse().ok());
    let debug = matches.get_flag("debug");

    let config = AppConfig {
        host,
        port,
        workers,
        debug,
    };

    // 启动应用
    AppBootstrap::new().with_config(config).run().await?;

    Ok(())
}
