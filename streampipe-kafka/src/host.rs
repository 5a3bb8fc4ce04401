use mac_address::get_mac_address;
use std::{
    fs::File,
    io::{BufRead, BufReader},
};

lazy_static::lazy_static! {
    static ref HOST_ID: String = init();
}

const LEN: usize = 12;

fn init() -> String {
    if let Ok(host_id) = std::env::var("HOST_ID") {
        return host_id;
    }
    if let Some(container_id) = container_id() {
        return container_id;
    }
    match get_mac_address() {
        Ok(Some(mac)) => {
            let mac = mac.to_string().replace(':', "");
            mac.chars().take(LEN).collect()
        }
        Ok(None) => "localhost".to_owned(),
        Err(err) => {
            log::debug!("Failed to get MAC address: {err}");
            "localhost".to_owned()
        }
    }
}

fn container_id() -> Option<String> {
    let file = File::open("/proc/self/cgroup").ok()?;
    // check whether this is a docker container
    let last = BufReader::new(file).lines().last()?.ok()?;
    let (_, remaining) = last.split_once("0::/docker/")?;
    remaining.get(..LEN).map(ToOwned::to_owned)
}

/// Identifies this host: `HOST_ID` if set, the container ID inside docker, otherwise the
/// MAC address.
pub fn host_id() -> &'static str {
    &HOST_ID
}

/// The `client.id` reported to the brokers, so that group members can be told apart.
pub fn client_id(prefix: &str) -> String {
    format!("{prefix}-{}-{}", host_id(), std::process::id())
}
