use std::net::TcpListener;

/// 同步检查端口是否可用 / Check whether a port is free
pub fn is_port_available_sync(port: u16) -> bool {
    TcpListener::bind(("0.0.0.0", port)).is_ok()
}

/// 从起始端口向上找可用端口，范围内找不到就退回起始端口
/// Scan upward from the start port; fall back to it if the range is full
pub fn available_port(start_port: u16) -> u16 {
    let mut port = start_port;
    let end = start_port.saturating_add(10);

    while port <= end {
        if is_port_available_sync(port) {
            if port != start_port {
                tracing::warn!(
                    "端口 {} 被占用，改用 {} / port occupied, falling back",
                    start_port,
                    port
                );
            }
            return port;
        }
        match port.checked_add(1) {
            Some(next) => port = next,
            None => break,
        }
    }

    start_port
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_available_port_skips_bound_port() {
        let listener = TcpListener::bind(("0.0.0.0", 0)).unwrap();
        let bound = listener.local_addr().unwrap().port();
        assert!(!is_port_available_sync(bound));
        let picked = available_port(bound);
        assert_ne!(picked, 0);
    }
}
