//! i3 IPC framing, shared by i3 and Sway.
//!
//! Every message, in both directions, is the magic string `i3-ipc`, a `u32`
//! payload length and a `u32` message type (both native-endian), then the
//! payload.  Replies carry the type of the request they answer.

use crate::command::BackendKind;
use std::io::{Read, Write};
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};

pub const MAGIC: &[u8; 6] = b"i3-ipc";

const HEADER_LEN: usize = MAGIC.len() + 8;

/// Errors that can occur when talking to i3 or Sway.
#[derive(Debug, thiserror::Error)]
#[error("i3 IPC error: {0}")]
pub struct I3Error(pub(crate) String);

/// Request types used by unilayout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    RunCommand,
    GetWorkspaces,
    GetOutputs,
    GetTree,
}

impl MessageType {
    pub fn code(self) -> u32 {
        match self {
            MessageType::RunCommand => 0,
            MessageType::GetWorkspaces => 1,
            MessageType::GetOutputs => 3,
            MessageType::GetTree => 4,
        }
    }
}

/// Frame `payload` as a message of type `kind`.
pub fn encode(kind: MessageType, payload: &str) -> Vec<u8> {
    let mut buf = Vec::with_capacity(HEADER_LEN + payload.len());
    buf.extend_from_slice(MAGIC);
    buf.extend_from_slice(&(payload.len() as u32).to_ne_bytes());
    buf.extend_from_slice(&kind.code().to_ne_bytes());
    buf.extend_from_slice(payload.as_bytes());
    buf
}

/// Read one framed message and return its type and payload.
pub fn read_message(reader: &mut impl Read) -> Result<(u32, String), I3Error> {
    let mut header = [0u8; HEADER_LEN];
    reader
        .read_exact(&mut header)
        .map_err(|e| I3Error(format!("read header: {}", e)))?;
    if &header[..MAGIC.len()] != MAGIC {
        return Err(I3Error("bad magic in reply".into()));
    }
    let word = |at: usize| {
        let mut bytes = [0u8; 4];
        bytes.copy_from_slice(&header[at..at + 4]);
        u32::from_ne_bytes(bytes)
    };
    let len = word(MAGIC.len()) as usize;
    let kind = word(MAGIC.len() + 4);

    let mut payload = vec![0u8; len];
    reader
        .read_exact(&mut payload)
        .map_err(|e| I3Error(format!("read payload: {}", e)))?;
    let payload = String::from_utf8(payload).map_err(|e| I3Error(format!("utf-8: {}", e)))?;
    Ok((kind, payload))
}

/// Send one request over a fresh connection to `socket` and return the reply
/// payload.
pub fn request(socket: &Path, kind: MessageType, payload: &str) -> Result<String, I3Error> {
    let mut stream = UnixStream::connect(socket)
        .map_err(|e| I3Error(format!("connect to {}: {}", socket.display(), e)))?;
    stream
        .write_all(&encode(kind, payload))
        .map_err(|e| I3Error(format!("write: {}", e)))?;
    let (reply_kind, reply) = read_message(&mut stream)?;
    if reply_kind != kind.code() {
        return Err(I3Error(format!(
            "expected reply type {}, got {}",
            kind.code(),
            reply_kind
        )));
    }
    Ok(reply)
}

/// Locate the IPC socket: `$SWAYSOCK` or `$I3SOCK`, falling back to asking
/// the window manager binary with `--get-socketpath`.
pub fn socket_path(kind: BackendKind) -> Result<PathBuf, I3Error> {
    let (var, binary) = match kind {
        BackendKind::Sway => ("SWAYSOCK", "sway"),
        BackendKind::I3 => ("I3SOCK", "i3"),
        other => return Err(I3Error(format!("{} does not speak i3 IPC", other))),
    };
    if let Ok(path) = std::env::var(var) {
        if !path.is_empty() {
            return Ok(PathBuf::from(path));
        }
    }
    let output = std::process::Command::new(binary)
        .arg("--get-socketpath")
        .output()
        .map_err(|e| I3Error(format!("{} not set and {} --get-socketpath failed: {}", var, binary, e)))?;
    let path = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if !output.status.success() || path.is_empty() {
        return Err(I3Error(format!("{} not set and no socket path reported by {}", var, binary)));
    }
    Ok(PathBuf::from(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::os::unix::net::UnixListener;
    use std::sync::atomic::{AtomicU32, Ordering};

    static TEST_ID: AtomicU32 = AtomicU32::new(0);

    fn tmp_socket_path() -> PathBuf {
        let id = TEST_ID.fetch_add(1, Ordering::SeqCst);
        std::env::temp_dir().join(format!("unilayout-i3-test-{}-{}.sock", std::process::id(), id))
    }

    #[test]
    fn encode_layout() {
        let buf = encode(MessageType::GetTree, "");
        assert_eq!(&buf[..6], b"i3-ipc");
        assert_eq!(&buf[6..10], &0u32.to_ne_bytes());
        assert_eq!(&buf[10..14], &4u32.to_ne_bytes());
        assert_eq!(buf.len(), 14);

        let buf = encode(MessageType::RunCommand, "focus left");
        assert_eq!(&buf[6..10], &10u32.to_ne_bytes());
        assert_eq!(&buf[14..], b"focus left");
    }

    #[test]
    fn read_message_decodes_frame() {
        let frame = encode(MessageType::GetOutputs, r#"[{"name":"eDP-1"}]"#);
        let (kind, payload) = read_message(&mut Cursor::new(frame)).unwrap();
        assert_eq!(kind, 3);
        assert_eq!(payload, r#"[{"name":"eDP-1"}]"#);
    }

    #[test]
    fn read_message_rejects_bad_magic() {
        let mut frame = encode(MessageType::GetTree, "{}");
        frame[0] = b'x';
        assert!(read_message(&mut Cursor::new(frame)).is_err());
    }

    #[test]
    fn read_message_rejects_truncated_payload() {
        let mut frame = encode(MessageType::GetTree, "{\"id\":1}");
        frame.truncate(frame.len() - 2);
        assert!(read_message(&mut Cursor::new(frame)).is_err());
    }

    #[test]
    fn request_round_trip_over_socket() {
        let path = tmp_socket_path();
        let _ = std::fs::remove_file(&path);
        let listener = UnixListener::bind(&path).expect("bind");

        let server = std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().expect("accept");
            let (kind, payload) = read_message(&mut stream).expect("read request");
            assert_eq!(kind, 0);
            assert_eq!(payload, "workspace 3");
            stream
                .write_all(&encode(MessageType::RunCommand, r#"[{"success":true}]"#))
                .expect("write reply");
        });

        let reply = request(&path, MessageType::RunCommand, "workspace 3").unwrap();
        assert_eq!(reply, r#"[{"success":true}]"#);
        server.join().unwrap();

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn mismatched_reply_type_is_an_error() {
        let path = tmp_socket_path();
        let _ = std::fs::remove_file(&path);
        let listener = UnixListener::bind(&path).expect("bind");

        let server = std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().expect("accept");
            let _ = read_message(&mut stream);
            let _ = stream.write_all(&encode(MessageType::GetWorkspaces, "[]"));
        });

        assert!(request(&path, MessageType::GetTree, "").is_err());
        server.join().unwrap();

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn non_i3_backend_has_no_socket() {
        assert!(socket_path(BackendKind::Aerospace).is_err());
    }
}
