//! The long-lived record for one master connection: addressing, auth phase,
//! per-timeslot transmit state, and the rx/tx callback slots the protocol
//! loop drives.

use std::net::SocketAddr;
use std::time::Instant;

use parking_lot::Mutex;

use crate::config::Config;
use crate::packet::Packet;

/// Authentication phase, per the state machine in the Homebrew auth design.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthPhase {
    None,
    Init,
    Fail,
    Conf,
    Done,
}

/// Per-timeslot transmit bookkeeping: the stream_id in effect for the
/// current burst, and when each kind of frame was last sent on that slot.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimeslotState {
    pub stream_id: u32,
    pub last_voice_sent: Option<Instant>,
    pub last_data_sent: Option<Instant>,
}

/// Mutable state touched from outside the protocol worker: the active flag
/// and the two timeslots' transmit bookkeeping. Guarded by one mutex, never
/// held across a blocking transport call.
#[derive(Debug, Default)]
pub struct SharedState {
    pub active: bool,
    pub tx: [TimeslotState; 2],
}

/// A callback invoked once per received packet, in registration order.
pub type RxCallback = Box<dyn Fn(&Packet) + Send + Sync>;

/// One Homebrew master connection.
pub struct Session {
    pub remote_addr: SocketAddr,
    pub local_addr: SocketAddr,
    /// 8-byte printable-ASCII repeater identifier, not NUL-terminated.
    pub repeater_id: [u8; 8],
    /// Server-supplied nonce, set once auth reaches `Init`.
    pub nonce: Option<[u8; 8]>,
    pub config: Config,
    pub auth: AuthPhase,
    pub last_ping_sent: Option<Instant>,
    shared: Mutex<SharedState>,
    rx_callbacks: Vec<RxCallback>,
}

impl Session {
    pub fn new(
        remote_addr: SocketAddr,
        local_addr: SocketAddr,
        repeater_id: [u8; 8],
        config: Config,
    ) -> Self {
        Session {
            remote_addr,
            local_addr,
            repeater_id,
            nonce: None,
            config,
            auth: AuthPhase::None,
            last_ping_sent: None,
            shared: Mutex::new(SharedState::default()),
            rx_callbacks: Vec::new(),
        }
    }

    /// Register an rx callback. Callbacks run in registration order and must
    /// not retain the packet beyond their call.
    pub fn register_rx(&mut self, callback: RxCallback) {
        self.rx_callbacks.push(callback);
    }

    /// Invoke every registered rx callback with this packet, in order.
    pub fn dispatch_rx(&self, packet: &Packet) {
        for callback in &self.rx_callbacks {
            callback(packet);
        }
    }

    pub fn is_active(&self) -> bool {
        self.shared.lock().active
    }

    pub fn set_active(&self, active: bool) {
        self.shared.lock().active = active;
    }

    /// Current stream_id for a timeslot, minting a fresh one if `fresh` is
    /// set (burst start).
    pub fn stream_id(&self, timeslot: usize, fresh: u32) -> u32 {
        let mut guard = self.shared.lock();
        let slot = &mut guard.tx[timeslot];
        if fresh != 0 {
            slot.stream_id = fresh;
        }
        slot.stream_id
    }

    pub fn note_voice_sent(&self, timeslot: usize, at: Instant) {
        self.shared.lock().tx[timeslot].last_voice_sent = Some(at);
    }

    pub fn note_data_sent(&self, timeslot: usize, at: Instant) {
        self.shared.lock().tx[timeslot].last_data_sent = Some(at);
    }

    /// The configured repeater id as a number, parsed from the 8 printable
    /// ASCII digits. Used to fill in `Packet::repeater_id` on outgoing frames
    /// when the caller left it zero.
    pub fn repeater_id_numeric(&self) -> u32 {
        std::str::from_utf8(&self.repeater_id)
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn sample_config() -> Config {
        Config {
            repeater_id: "31337001".into(),
            call_sign: "N0CALL".into(),
            rx_freq_hz: "446006250".into(),
            tx_freq_hz: "446006250".into(),
            tx_power: "10".into(),
            color_code: "01".into(),
            latitude: "0".into(),
            longitude: "0".into(),
            antenna_height_m: "0".into(),
            location: "".into(),
            description: "".into(),
            url: "".into(),
            software_id: "".into(),
            package_id: "".into(),
        }
    }

    fn new_session() -> Session {
        Session::new(
            "127.0.0.1:62031".parse().unwrap(),
            "127.0.0.1:0".parse().unwrap(),
            *b"31337001",
            sample_config(),
        )
    }

    #[test]
    fn repeater_id_numeric_parses_ascii_digits() {
        let session = new_session();
        assert_eq!(session.repeater_id_numeric(), 31_337_001);
    }

    #[test]
    fn active_flag_round_trips() {
        let session = new_session();
        assert!(!session.is_active());
        session.set_active(true);
        assert!(session.is_active());
    }

    #[test]
    fn stream_id_persists_until_refreshed() {
        let session = new_session();
        assert_eq!(session.stream_id(0, 0xdead_beef), 0xdead_beef);
        assert_eq!(session.stream_id(0, 0), 0xdead_beef);
        assert_eq!(session.stream_id(0, 0xcafe_babe), 0xcafe_babe);
        assert_eq!(session.stream_id(1, 0), 0);
    }

    #[test]
    fn rx_callbacks_run_in_registration_order() {
        let mut session = new_session();
        let order = Arc::new(Mutex::new(Vec::new()));
        let counter = Arc::new(AtomicUsize::new(0));
        for label in 0..3u32 {
            let order = order.clone();
            let counter = counter.clone();
            session.register_rx(Box::new(move |_packet| {
                let seq = counter.fetch_add(1, Ordering::SeqCst);
                order.lock().push((label, seq));
            }));
        }
        let packet = crate::packet::Packet {
            src_id: 1,
            dst_id: 2,
            repeater_id: 3,
            timeslot: crate::packet::Timeslot::One,
            flco: crate::packet::Flco::GroupCall,
            data_type: crate::packet::DataType::Voice,
            meta: crate::packet::Meta {
                sequence: 0,
                voice_frame: 0,
                stream_id: 0,
            },
            payload: [0u8; crate::packet::PAYLOAD_BYTES],
        };
        session.dispatch_rx(&packet);
        let recorded = order.lock();
        assert_eq!(recorded.iter().map(|(l, _)| *l).collect::<Vec<_>>(), vec![0, 1, 2]);
    }
}
