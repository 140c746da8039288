use anyhow::Context;
use reune_server::AppState;
use std::net::{IpAddr, SocketAddr};
use std::path::Path;

pub fn run(root: &Path, port: Option<u16>, bind: Option<&str>) -> anyhow::Result<()> {
    let state = AppState::open(root.to_path_buf()).context("failed to open project")?;

    let bind = bind.unwrap_or(&state.config.server.bind);
    let ip: IpAddr = bind
        .parse()
        .with_context(|| format!("invalid bind address '{bind}'"))?;
    let addr = SocketAddr::new(ip, port.unwrap_or(state.config.server.port));

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(reune_server::serve(state, addr))
}
