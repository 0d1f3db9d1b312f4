//! The login/challenge/response/config state machine that brings a session
//! from `AuthPhase::None` to `AuthPhase::Done` before the protocol loop
//! takes over.

use std::time::Duration;

use log::{debug, trace};
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};
use crate::packet::{frame_type, FrameType};
use crate::session::{AuthPhase, Session};
use crate::transport::Transport;

/// Bound on every send-then-recv step of the handshake.
const STEP_TIMEOUT: Duration = Duration::from_secs(5);

fn hex_lower(digest: &[u8]) -> String {
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

/// Drive `session` from `None` through `Done`, or return an error if the
/// master rejects the login or key. `secret` is the repeater's shared
/// passphrase with the master.
pub fn authenticate(session: &mut Session, transport: &Transport, secret: &str) -> Result<()> {
    while session.auth != AuthPhase::Done {
        match session.auth {
            AuthPhase::None => {
                let mut buf = Vec::with_capacity(12);
                buf.extend_from_slice(b"RPTL");
                buf.extend_from_slice(&session.repeater_id);
                trace!("auth: sending repeater id");
                transport.send_raw(&buf)?;

                loop {
                    let received = transport.recv_raw(STEP_TIMEOUT)?;
                    match frame_type(&received) {
                        FrameType::MasterNak => {
                            session.auth = AuthPhase::Fail;
                            return Err(Error::ProtocolRejected);
                        }
                        FrameType::MasterAckNonce => {
                            let mut nonce = [0u8; 8];
                            nonce.copy_from_slice(&received[14..22]);
                            session.nonce = Some(nonce);
                            debug!("auth: master accepted our repeater id");
                            session.auth = AuthPhase::Init;
                            break;
                        }
                        FrameType::MasterClosing => return Err(Error::ProtocolClosed),
                        _ => continue,
                    }
                }
            }

            AuthPhase::Init => {
                let nonce = session
                    .nonce
                    .ok_or_else(|| Error::InvalidArgument("auth: missing nonce in Init".into()))?;
                let mut hasher = Sha256::new();
                hasher.update(nonce);
                hasher.update(secret.as_bytes());
                let digest = hasher.finalize();

                let mut buf = Vec::with_capacity(12 + 64);
                buf.extend_from_slice(b"RPTK");
                buf.extend_from_slice(&session.repeater_id);
                buf.extend_from_slice(hex_lower(&digest).as_bytes());
                trace!("auth: sending challenge response");
                transport.send_raw(&buf)?;

                loop {
                    let received = transport.recv_raw(STEP_TIMEOUT)?;
                    match frame_type(&received) {
                        FrameType::MasterNak => {
                            session.auth = AuthPhase::Fail;
                            return Err(Error::ProtocolRejected);
                        }
                        FrameType::MasterAck => {
                            debug!("auth: master accepted nonce, logged in");
                            session.auth = AuthPhase::Conf;
                            break;
                        }
                        FrameType::MasterClosing => return Err(Error::ProtocolClosed),
                        _ => continue,
                    }
                }
            }

            AuthPhase::Fail => return Err(Error::ProtocolRejected),

            AuthPhase::Conf => {
                trace!("auth: sending configuration");
                let blob = session.config.to_bytes()?;
                transport.send_raw(&blob)?;
                session.auth = AuthPhase::Done;
                session.last_ping_sent = Some(std::time::Instant::now());
            }

            AuthPhase::Done => break,
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn hex_lower_matches_expected_case_and_width() {
        let digest = [0x00u8, 0xab, 0xff];
        assert_eq!(hex_lower(&digest), "00abff");
    }

    #[test]
    fn challenge_response_digest_is_sha256_of_nonce_then_secret() {
        let nonce = *b"abcd1234";
        let secret = "s3cr3t";
        let mut hasher = Sha256::new();
        hasher.update(nonce);
        hasher.update(secret.as_bytes());
        let digest = hasher.finalize();
        assert_eq!(hex_lower(&digest).len(), 64);
    }

    fn sample_config() -> crate::config::Config {
        crate::config::Config {
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

    #[test]
    fn master_closing_during_login_step_surfaces_protocol_closed() {
        let probe_a = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
        let a_addr = probe_a.local_addr().unwrap();
        let probe_b = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
        let b_addr = probe_b.local_addr().unwrap();
        drop(probe_a);
        drop(probe_b);

        let repeater = Transport::bind(a_addr, b_addr).unwrap();
        let master = Transport::bind(b_addr, a_addr).unwrap();

        let mut session = Session::new(a_addr, b_addr, *b"31337001", sample_config());

        let master_thread = std::thread::spawn(move || {
            let received = master.recv_raw(STEP_TIMEOUT).unwrap();
            assert_eq!(&received, b"RPTL31337001");
            master.send_raw(b"MSTCL12345678").unwrap();
        });

        let result = authenticate(&mut session, &repeater, "s3cr3t");
        master_thread.join().unwrap();

        assert!(matches!(result, Err(Error::ProtocolClosed)));
    }
}
