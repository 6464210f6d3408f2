//! `discover` subcommand — wait for a device announcement.

use std::net::IpAddr;
use std::sync::atomic::Ordering;
use std::time::Instant;

use plussy_lib::discovery::Discovery;

use super::{Config, DiscoverOutput, Options, PlussyError, RUNNING, Result, kv, kv_width};

/// Poll until an announcement arrives, `opts.timeout` passes, or Ctrl+C.
fn wait_for_device(config: &Config, opts: &Options) -> Result<IpAddr> {
    let net = config.network();
    // Short attempts keep Ctrl+C and the overall deadline responsive
    let attempt = net.discovery_timeout.min(super::POLL * 5);
    let mut discovery = Discovery::bind(net.port, attempt, &net.discovery_marker)?;
    log::debug!("listening on {}", discovery.local_addr()?);

    let deadline = Instant::now() + opts.timeout;
    while RUNNING.load(Ordering::SeqCst) {
        match discovery.poll_once() {
            Ok(Some(ip)) => return Ok(ip),
            Ok(None) | Err(PlussyError::DiscoveryTimeout) => {}
            Err(e) => return Err(e),
        }
        if Instant::now() >= deadline {
            return Err(PlussyError::DiscoveryTimeout);
        }
    }
    Err(PlussyError::Cancelled)
}

pub(super) fn cmd_discover(config: &Config, opts: &Options) -> Result<()> {
    if !opts.json {
        println!(
            "Listening for announcements on UDP port {} ({}s)...",
            config.port,
            opts.timeout.as_secs()
        );
    }
    let ip = wait_for_device(config, opts)?;

    if opts.json {
        return super::print_json(&DiscoverOutput {
            address: ip.to_string(),
            port: config.port,
        });
    }

    let w = kv_width(&["Device:", "Port:"], &[]);
    kv("Device:", ip, w);
    kv("Port:", config.port, w);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{Ipv4Addr, UdpSocket};
    use std::time::Duration;

    fn opts(timeout: Duration) -> Options {
        Options {
            json: false,
            config_path: None,
            timeout,
        }
    }

    /// Config on a port nothing else uses.
    fn free_port_config() -> Config {
        let spare = UdpSocket::bind("127.0.0.1:0").unwrap();
        let port = spare.local_addr().unwrap().port();
        drop(spare);
        Config {
            port,
            discovery_timeout_ms: 50,
            ..Config::default()
        }
    }

    #[test]
    fn gives_up_after_timeout() {
        let config = free_port_config();
        let start = Instant::now();
        let result = wait_for_device(&config, &opts(Duration::from_millis(200)));
        assert!(matches!(result, Err(PlussyError::DiscoveryTimeout)));
        assert!(start.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn finds_announcing_device() {
        let config = free_port_config();
        let port = config.port;
        let announcer = std::thread::spawn(move || {
            let tx = UdpSocket::bind("127.0.0.1:0").unwrap();
            for _ in 0..40 {
                let _ = tx.send_to(b"plussyDisplay", ("127.0.0.1", port));
                std::thread::sleep(Duration::from_millis(25));
            }
        });
        let ip = wait_for_device(&config, &opts(Duration::from_secs(2))).unwrap();
        assert_eq!(ip, IpAddr::V4(Ipv4Addr::LOCALHOST));
        announcer.join().unwrap();
    }
}
