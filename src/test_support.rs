/// Shared test fixtures: a minimal fake backend speaking just enough RESP
/// to answer pool probes.
use std::net::SocketAddr;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Spawn a backend replying with a fixed RESP line to every complete command
///
/// Clients may pipeline several commands into one packet (redis-rs sends its
/// CLIENT SETINFO pair that way during connection setup), so replies are
/// paced per parsed command rather than per read.
pub(crate) async fn spawn_fake_backend(reply: &'static str) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut pending = Vec::new();
                let mut buf = [0u8; 512];
                loop {
                    match stream.read(&mut buf).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => {
                            pending.extend_from_slice(&buf[..n]);
                            while let Some(consumed) = command_len(&pending) {
                                pending.drain(..consumed);
                                if stream.write_all(reply.as_bytes()).await.is_err() {
                                    return;
                                }
                            }
                        }
                    }
                }
            });
        }
    });

    addr
}

/// Bytes making up one complete RESP command array at the front of `buf`
fn command_len(buf: &[u8]) -> Option<usize> {
    if buf.first() != Some(&b'*') {
        return None;
    }
    let mut pos = line_end(buf, 1)?;
    let argc: usize = std::str::from_utf8(&buf[1..pos - 2]).ok()?.parse().ok()?;

    for _ in 0..argc {
        if buf.get(pos) != Some(&b'$') {
            return None;
        }
        let data = line_end(buf, pos + 1)?;
        let len: usize = std::str::from_utf8(&buf[pos + 1..data - 2])
            .ok()?
            .parse()
            .ok()?;
        pos = data + len + 2;
        if pos > buf.len() {
            return None;
        }
    }
    Some(pos)
}

/// Index just past the next CRLF at or after `from`
fn line_end(buf: &[u8], from: usize) -> Option<usize> {
    let mut i = from;
    while i + 1 < buf.len() {
        if buf[i] == b'\r' && buf[i + 1] == b'\n' {
            return Some(i + 2);
        }
        i += 1;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_len_single_command() {
        let ping = b"*1\r\n$4\r\nPING\r\n";
        assert_eq!(command_len(ping), Some(ping.len()));
    }

    #[test]
    fn test_command_len_pipelined_commands_split_at_boundary() {
        // Two commands in one packet, the way redis-rs pipelines its
        // connection setup
        let first = b"*4\r\n$6\r\nCLIENT\r\n$7\r\nSETINFO\r\n$8\r\nLIB-NAME\r\n$8\r\nredis-rs\r\n";
        let second = b"*1\r\n$4\r\nPING\r\n";
        let mut packet = first.to_vec();
        packet.extend_from_slice(second);

        assert_eq!(command_len(&packet), Some(first.len()));
        assert_eq!(command_len(&packet[first.len()..]), Some(second.len()));
    }

    #[test]
    fn test_command_len_incomplete_command() {
        assert_eq!(command_len(b"*1\r\n$4\r\nPI"), None);
        assert_eq!(command_len(b"*2\r\n$4\r\nPING\r\n"), None);
        assert_eq!(command_len(b""), None);
    }
}
