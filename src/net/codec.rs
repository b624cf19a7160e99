//! Minimal section framing for the detection protocol.
//!
//! Only what the heartbeat needs: a section is one tag byte followed by a
//! little-endian `u32` body length and the body itself. A message is a run of
//! sections ending with one whose tag carries [`MASK_LAST`].

use std::io;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

pub const TAG_HEADER: u8 = 0x01;
pub const MASK_FIRST: u8 = 0x40;
pub const MASK_LAST: u8 = 0x80;

/// Upper bound on a single section body accepted from the peer.
pub const MAX_SECTION_LEN: u32 = 16 * 1024 * 1024;

/// Write one section.
pub async fn write_section<W>(writer: &mut W, tag: u8, body: &[u8]) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let len = u32::try_from(body.len())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "section body too large"))?;
    let mut header = [0u8; 5];
    header[0] = tag;
    header[1..].copy_from_slice(&len.to_le_bytes());
    writer.write_all(&header).await?;
    writer.write_all(body).await?;
    writer.flush().await
}

/// Read one section, returning its tag and body.
pub async fn read_section<R>(reader: &mut R) -> io::Result<(u8, Vec<u8>)>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; 5];
    reader.read_exact(&mut header).await?;
    let len = u32::from_le_bytes([header[1], header[2], header[3], header[4]]);
    if len > MAX_SECTION_LEN {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("section length {len} exceeds limit"),
        ));
    }
    let mut body = vec![0u8; len as usize];
    reader.read_exact(&mut body).await?;
    Ok((header[0], body))
}

/// Send an empty header section and consume the reply up to its last section.
pub async fn heartbeat<S>(stream: &mut S) -> io::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    write_section(stream, TAG_HEADER | MASK_FIRST | MASK_LAST, &[]).await?;
    loop {
        let (tag, _) = read_section(stream).await?;
        if tag & MASK_LAST != 0 {
            return Ok(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;

    #[tokio::test]
    async fn heartbeat_reads_until_last_section() {
        let (mut client, mut server) = duplex(256);

        let peer = tokio::spawn(async move {
            let (tag, body) = read_section(&mut server).await.unwrap();
            assert_eq!(tag, 0xC1);
            assert!(body.is_empty());
            write_section(&mut server, TAG_HEADER | MASK_FIRST, b"?").await.unwrap();
            write_section(&mut server, 0x02 | MASK_LAST, b"ok").await.unwrap();
        });

        heartbeat(&mut client).await.unwrap();
        peer.await.unwrap();
    }

    #[tokio::test]
    async fn heartbeat_fails_on_closed_peer() {
        let (mut client, server) = duplex(64);
        drop(server);
        assert!(heartbeat(&mut client).await.is_err());
    }

    #[tokio::test]
    async fn rejects_oversized_section() {
        let (mut client, mut server) = duplex(64);
        let mut header = vec![TAG_HEADER | MASK_LAST];
        header.extend_from_slice(&(MAX_SECTION_LEN + 1).to_le_bytes());
        server.write_all(&header).await.unwrap();

        let err = read_section(&mut client).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }
}
