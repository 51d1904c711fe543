//! Process-level glue: executor thread, channel pump, stdin pump and
//! shutdown handling.

use crate::channel::UdpChannel;
use fsmrt_core::{Automaton, AutomatonHandle, Channel, Packet};
use fsmrt_protocol::PeerCommand;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncBufReadExt;

/// Interval between control-loop iterations.
const PUMP_INTERVAL: Duration = Duration::from_millis(10);

/// Runs the automaton on a dedicated executor thread and pumps external
/// commands into it until a shutdown source fires.
///
/// The channel is shared: the executor sends snapshots through it while
/// the driver polls it for peer commands.
pub struct Driver {
    channel: Arc<UdpChannel>,
    handle: AutomatonHandle,
    executor: Option<std::thread::JoinHandle<()>>,
}

impl Driver {
    /// Attaches the channel to the automaton and spawns the executor.
    pub fn start(mut automaton: Automaton, channel: Arc<UdpChannel>) -> Self {
        automaton.attach_channel(channel.clone());
        let handle = automaton.handle();
        let executor = std::thread::spawn(move || automaton.run());
        Self {
            channel,
            handle,
            executor: Some(executor),
        }
    }

    /// Handle onto the running automaton.
    pub fn handle(&self) -> AutomatonHandle {
        self.handle.clone()
    }

    /// Drains pending peer datagrams, dispatching commands onto the
    /// automaton. Returns true when the peer requested shutdown.
    ///
    /// Malformed JSON is dropped; unknown message types are ignored.
    pub fn pump(&self) -> bool {
        let mut pkt = Packet::default();
        while self.channel.poll(&mut pkt) {
            match PeerCommand::decode(&pkt.json) {
                Ok(Some(PeerCommand::Inject { name, value })) => {
                    self.handle.inject_input(name, value);
                }
                Ok(Some(PeerCommand::SetVar { name, value })) => {
                    self.handle.set_variable(name, value);
                }
                Ok(Some(PeerCommand::Shutdown)) => {
                    tracing::info!("shutdown requested by peer");
                    return true;
                }
                Ok(None) => tracing::trace!(json = %pkt.json, "ignoring unknown peer message"),
                Err(e) => tracing::trace!(error = %e, "dropping malformed datagram"),
            }
        }
        false
    }

    /// Control loop: peer datagrams every ~10 ms, stdin `name:value` lines,
    /// Ctrl-C. Returns when any shutdown source fires.
    pub async fn run_control_loop(&self) {
        let mut stdin = tokio::io::BufReader::new(tokio::io::stdin()).lines();
        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);

        loop {
            tokio::select! {
                _ = &mut ctrl_c => {
                    tracing::info!("interrupt received, shutting down");
                    break;
                }
                line = stdin.next_line() => {
                    match line {
                        Ok(Some(line)) => self.inject_line(&line),
                        Ok(None) => {
                            tracing::info!("stdin closed, shutting down");
                            break;
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "stdin read failed, shutting down");
                            break;
                        }
                    }
                }
                _ = tokio::time::sleep(PUMP_INTERVAL) => {
                    if self.pump() {
                        break;
                    }
                }
            }
        }
    }

    /// Treats a `name:value` line as an injected input.
    fn inject_line(&self, line: &str) {
        if let Some((name, value)) = line.split_once(':') {
            self.handle.inject_input(name, value);
        }
    }

    /// Stops the executor and joins it.
    pub fn shutdown(mut self) {
        self.handle.request_stop();
        if let Some(executor) = self.executor.take() {
            if executor.join().is_err() {
                tracing::error!("executor thread panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::build_automaton;
    use fsmrt_core::{FsmDocument, ScriptHost};
    use std::net::{SocketAddr, UdpSocket};

    fn loopback() -> SocketAddr {
        "127.0.0.1:0".parse().unwrap()
    }

    fn minimal_automaton() -> Automaton {
        let (doc, _) = FsmDocument::from_json_str(
            r#"{"name":"m","inputs":["go"],"outputs":[],"variables":[],
                "states":[{"id":"A"},{"id":"B"}],
                "transitions":[{"from":"A","to":"B","trigger":"go"}]}"#,
        )
        .unwrap();
        let mut host = ScriptHost::new();
        build_automaton(&doc, &mut host).unwrap()
    }

    #[test]
    fn test_pump_dispatches_and_detects_shutdown() {
        let peer = UdpSocket::bind(loopback()).unwrap();
        let channel = Arc::new(
            UdpChannel::bind(loopback(), peer.local_addr().unwrap()).unwrap(),
        );
        let engine_addr = channel.local_addr().unwrap();

        let driver = Driver::start(minimal_automaton(), channel);

        peer.send_to(br#"{"type":"inject","name":"go","value":"1"}"#, engine_addr)
            .unwrap();
        peer.send_to(b"{garbage", engine_addr).unwrap();
        peer.send_to(br#"{"type":"mystery"}"#, engine_addr).unwrap();

        // Give the datagrams time to land, then pump; none of these stop
        // the driver.
        std::thread::sleep(Duration::from_millis(50));
        assert!(!driver.pump());

        peer.send_to(br#"{"type":"shutdown"}"#, engine_addr).unwrap();
        std::thread::sleep(Duration::from_millis(50));
        assert!(driver.pump());

        driver.shutdown();
    }

    #[test]
    fn test_inject_line_parses_name_value() {
        let peer = UdpSocket::bind(loopback()).unwrap();
        let channel = Arc::new(
            UdpChannel::bind(loopback(), peer.local_addr().unwrap()).unwrap(),
        );

        let mut automaton = minimal_automaton();
        let states = {
            use parking_lot::Mutex;
            let states = Arc::new(Mutex::new(Vec::new()));
            let sink = states.clone();
            automaton.set_snapshot_hook(Box::new(move |s: &str| sink.lock().push(s.to_string())));
            states
        };

        let driver = Driver::start(automaton, channel);
        driver.inject_line("go:1");
        driver.inject_line("not a command line");

        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        while std::time::Instant::now() < deadline && states.lock().is_empty() {
            std::thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(states.lock().as_slice(), &["B".to_string()]);

        driver.shutdown();
    }
}
