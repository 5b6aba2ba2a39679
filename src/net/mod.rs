//! Connection to the game server
//!
//! A minimal offline-mode client for 1.20.4: TCP connect, login and
//! configuration walk, then a background reader that answers keep-alives and
//! tracks the synchronized player position. Outbound traffic is either a
//! chat-command packet or a pre-encoded raw frame.

pub mod codec;
pub mod protocol;

use std::io::{Cursor, Read, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::Context;
use byteorder::{BigEndian, ReadBytesExt};
use flate2::Compression;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use parking_lot::RwLock;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::Mutex;

use crate::capture::Transport;
use crate::config::Config;
use crate::error::TransportError;
use codec::{DecodeError, DecodeResult, PacketDecoderExt, PacketEncoderExt};

// Constants for connection and timing
const SPAWN_WAIT_ATTEMPTS: u32 = 100;
const SPAWN_WAIT_DELAY_MS: u64 = 100;
const COMMAND_TRIGGER: char = '/';

struct PacketWriter<W> {
    stream: W,
    compression: Option<usize>,
}

impl<W: AsyncWrite + Unpin> PacketWriter<W> {
    async fn write_packet(&mut self, id: i32, body: &[u8]) -> std::io::Result<()> {
        let mut data = codec::varint(id);
        data.extend_from_slice(body);
        self.write_frame(&data).await
    }

    /// Write one frame: length prefix, then (possibly compressed) payload.
    /// `data` is a complete packet, id included.
    async fn write_frame(&mut self, data: &[u8]) -> std::io::Result<()> {
        let mut out = Vec::with_capacity(data.len() + 8);
        match self.compression {
            None => {
                out.extend(codec::varint(data.len() as i32));
                out.extend_from_slice(data);
            }
            // Below the threshold, a zero data-length marks the payload as
            // not actually compressed
            Some(threshold) if data.len() < threshold => {
                out.extend(codec::varint((data.len() + 1) as i32));
                out.push(0);
                out.extend_from_slice(data);
            }
            Some(_) => {
                let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
                encoder.write_all(data)?;
                let compressed = encoder.finish()?;
                let data_length = codec::varint(data.len() as i32);
                out.extend(codec::varint((data_length.len() + compressed.len()) as i32));
                out.extend(data_length);
                out.extend(compressed);
            }
        }
        self.stream.write_all(&out).await
    }
}

struct PacketReader<R> {
    stream: R,
    compression: Option<usize>,
}

impl<R: AsyncRead + Unpin> PacketReader<R> {
    async fn read_varint(&mut self) -> DecodeResult<i32> {
        let mut num_read = 0;
        let mut result = 0i32;
        loop {
            let byte = self.stream.read_u8().await?;
            result |= ((byte & 0x7F) as i32) << (7 * num_read);
            num_read += 1;
            if byte & 0x80 == 0 {
                return Ok(result);
            }
            if num_read == 5 {
                return Err(DecodeError::VarIntTooBig);
            }
        }
    }

    /// Read one frame and return the packet id plus a cursor over the body
    async fn read_frame(&mut self) -> DecodeResult<(i32, Cursor<Vec<u8>>)> {
        let length = self.read_varint().await? as usize;
        let mut data = vec![0u8; length];
        self.stream.read_exact(&mut data).await?;

        let payload = match self.compression {
            None => data,
            Some(_) => {
                let mut cursor = Cursor::new(data);
                let decompressed_length = cursor.read_varint()? as usize;
                let header = cursor.position() as usize;
                let data = cursor.into_inner();
                let rest = &data[header..];
                if decompressed_length == 0 {
                    rest.to_vec()
                } else {
                    let mut decompressed = Vec::with_capacity(decompressed_length);
                    ZlibDecoder::new(rest).read_to_end(&mut decompressed)?;
                    decompressed
                }
            }
        };

        let mut cursor = Cursor::new(payload);
        let id = cursor.read_varint()?;
        Ok((id, cursor))
    }
}

/// An established, logged-in connection in the play state
pub struct Connection {
    writer: Arc<Mutex<PacketWriter<OwnedWriteHalf>>>,
    position: Arc<RwLock<Option<[f64; 3]>>>,
    alive: Arc<AtomicBool>,
}

impl Connection {
    /// Connect, log in (offline mode), and walk the configuration phase.
    /// Returns once the connection has reached the play state.
    pub async fn connect(config: &Config) -> anyhow::Result<Self> {
        let protocol_version = protocol::protocol_for(&config.version).with_context(|| {
            format!(
                "unsupported game version {} (supported: {})",
                config.version,
                protocol::GAME_VERSION
            )
        })?;

        tracing::info!(host = %config.host, port = config.port, "connecting to server");
        let stream = TcpStream::connect((config.host.as_str(), config.port))
            .await
            .with_context(|| format!("failed to connect to {}:{}", config.host, config.port))?;
        stream.set_nodelay(true)?;

        let (read_half, write_half) = stream.into_split();
        let mut reader = PacketReader {
            stream: read_half,
            compression: None,
        };
        let mut writer = PacketWriter {
            stream: write_half,
            compression: None,
        };

        let mut body = Vec::new();
        body.write_varint(protocol_version);
        body.write_string(&config.host);
        body.write_unsigned_short(config.port);
        body.write_varint(protocol::handshake::NEXT_STATE_LOGIN);
        writer.write_packet(protocol::handshake::INTENTION, &body).await?;

        let mut body = Vec::new();
        body.write_string(&config.username);
        body.write_uuid(offline_uuid(&config.username));
        writer
            .write_packet(protocol::login::serverbound::HELLO, &body)
            .await?;

        loop {
            let (id, mut packet) = reader.read_frame().await?;
            use protocol::login::clientbound as login;
            match id {
                login::SET_COMPRESSION => {
                    let threshold = packet.read_varint()?;
                    if threshold >= 0 {
                        reader.compression = Some(threshold as usize);
                        writer.compression = Some(threshold as usize);
                    }
                }
                login::SUCCESS => {
                    writer
                        .write_packet(protocol::login::serverbound::ACKNOWLEDGED, &[])
                        .await?;
                    break;
                }
                login::ENCRYPTION_REQUEST => {
                    anyhow::bail!(
                        "server requested encryption; only offline-mode servers are supported"
                    );
                }
                login::DISCONNECT => {
                    let reason = packet.read_string().unwrap_or_default();
                    anyhow::bail!("login refused: {reason}");
                }
                _ => {}
            }
        }
        tracing::info!(username = %config.username, "logged in");

        let mut body = Vec::new();
        body.write_string("en_us");
        body.write_byte(8); // view distance
        body.write_varint(0); // chat visibility: full
        body.write_bool(true); // chat colors
        body.write_unsigned_byte(0x7F); // skin parts
        body.write_varint(1); // main hand: right
        body.write_bool(false); // text filtering
        body.write_bool(true); // allow server listings
        writer
            .write_packet(
                protocol::configuration::serverbound::CLIENT_INFORMATION,
                &body,
            )
            .await?;

        loop {
            let (id, mut packet) = reader.read_frame().await?;
            use protocol::configuration::{clientbound, serverbound};
            match id {
                clientbound::FINISH => {
                    writer.write_packet(serverbound::FINISH_ACK, &[]).await?;
                    break;
                }
                clientbound::KEEP_ALIVE => {
                    let payload = packet.read_long()?;
                    let mut body = Vec::new();
                    body.write_long(payload);
                    writer.write_packet(serverbound::KEEP_ALIVE, &body).await?;
                }
                clientbound::PING => {
                    let payload = PacketDecoderExt::read_int(&mut packet)?;
                    let mut body = Vec::new();
                    body.write_int(payload);
                    writer.write_packet(serverbound::PONG, &body).await?;
                }
                clientbound::DISCONNECT => {
                    anyhow::bail!("disconnected during configuration");
                }
                // registries, tags, feature flags
                _ => {}
            }
        }
        tracing::info!("configuration finished, entering play state");

        let writer = Arc::new(Mutex::new(writer));
        let position = Arc::new(RwLock::new(None));
        let alive = Arc::new(AtomicBool::new(true));
        tokio::spawn(run_reader(
            reader,
            writer.clone(),
            position.clone(),
            alive.clone(),
        ));

        Ok(Self {
            writer,
            position,
            alive,
        })
    }

    /// Latest position synchronized by the server, if any
    pub fn position(&self) -> Option<[f64; 3]> {
        *self.position.read()
    }

    pub fn alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    /// Wait until the server has synchronized our position at least once
    pub async fn wait_for_spawn(&self) -> anyhow::Result<[f64; 3]> {
        for _ in 0..SPAWN_WAIT_ATTEMPTS {
            if let Some(pos) = self.position() {
                return Ok(pos);
            }
            if !self.alive() {
                anyhow::bail!("connection lost before spawn");
            }
            tokio::time::sleep(Duration::from_millis(SPAWN_WAIT_DELAY_MS)).await;
        }
        anyhow::bail!("server never synchronized a spawn position")
    }
}

async fn run_reader(
    mut reader: PacketReader<OwnedReadHalf>,
    writer: Arc<Mutex<PacketWriter<OwnedWriteHalf>>>,
    position: Arc<RwLock<Option<[f64; 3]>>>,
    alive: Arc<AtomicBool>,
) {
    use protocol::play::{clientbound, serverbound};

    loop {
        let (id, mut packet) = match reader.read_frame().await {
            Ok(frame) => frame,
            Err(err) => {
                tracing::warn!(error = %err, "connection read failed");
                break;
            }
        };

        match id {
            clientbound::KEEP_ALIVE => match packet.read_long() {
                Ok(payload) => {
                    let mut body = Vec::new();
                    body.write_long(payload);
                    if let Err(err) = writer
                        .lock()
                        .await
                        .write_packet(serverbound::KEEP_ALIVE, &body)
                        .await
                    {
                        tracing::warn!(error = %err, "keep-alive reply failed");
                        break;
                    }
                }
                Err(err) => tracing::warn!(error = %err, "malformed keep-alive"),
            },
            clientbound::SYNC_PLAYER_POSITION => match decode_sync_position(&mut packet) {
                Ok((pos, teleport_id)) => {
                    *position.write() = Some(pos);
                    let mut body = Vec::new();
                    body.write_varint(teleport_id);
                    if let Err(err) = writer
                        .lock()
                        .await
                        .write_packet(serverbound::ACCEPT_TELEPORTATION, &body)
                        .await
                    {
                        tracing::warn!(error = %err, "teleport confirmation failed");
                        break;
                    }
                }
                Err(err) => tracing::warn!(error = %err, "malformed position sync"),
            },
            clientbound::DISCONNECT => {
                tracing::warn!("server closed the session");
                break;
            }
            _ => {}
        }
    }

    alive.store(false, Ordering::SeqCst);
}

fn decode_sync_position(packet: &mut Cursor<Vec<u8>>) -> DecodeResult<([f64; 3], i32)> {
    let x = packet.read_double()?;
    let y = packet.read_double()?;
    let z = packet.read_double()?;
    let _yaw = packet.read_float()?;
    let _pitch = packet.read_float()?;
    let _flags = packet.read_unsigned_byte()?;
    let teleport_id = packet.read_varint()?;
    Ok(([x, y, z], teleport_id))
}

impl Transport for Connection {
    async fn send_command(&self, command: &str) -> Result<(), TransportError> {
        if !self.alive() {
            return Err(TransportError::Closed);
        }
        let command = command.strip_prefix(COMMAND_TRIGGER).unwrap_or(command);

        let mut body = Vec::new();
        body.write_string(command);
        body.write_long(unix_millis());
        body.write_long(0); // salt
        body.write_varint(0); // argument signatures
        body.write_varint(0); // acknowledged messages
        body.write_bytes(&[0, 0, 0]); // acknowledgement bitset, 20 bits

        self.writer
            .lock()
            .await
            .write_packet(protocol::play::serverbound::CHAT_COMMAND, &body)
            .await?;
        Ok(())
    }

    async fn send_raw(&self, bytes: &[u8]) -> Result<(), TransportError> {
        if !self.alive() {
            return Err(TransportError::Closed);
        }
        self.writer.lock().await.write_frame(bytes).await?;
        Ok(())
    }
}

/// Deterministic UUID for offline-mode login
fn offline_uuid(username: &str) -> u128 {
    ReadBytesExt::read_u128::<BigEndian>(&mut Cursor::new(
        md5::compute(format!("OfflinePlayer:{username}")).0,
    ))
    .unwrap_or_default()
        // version 3, variant 1
        & (!(0xC_u128 << 60) & !(0xF_u128 << 76))
        | ((0x8_u128 << 60) | (0x3_u128 << 76))
}

fn unix_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offline_uuid_is_deterministic_and_versioned() {
        let a = offline_uuid("builder");
        let b = offline_uuid("builder");
        let c = offline_uuid("someone_else");
        assert_eq!(a, b);
        assert_ne!(a, c);
        // uuid version 3 (name-based, md5)
        assert_eq!((a >> 76) & 0xF, 3);
        // rfc 4122 variant bits
        assert_eq!((a >> 62) & 0x3, 0x2);
    }

    #[tokio::test]
    async fn frames_round_trip_without_compression() {
        let (client, server) = tokio::io::duplex(4096);
        let mut writer = PacketWriter {
            stream: client,
            compression: None,
        };
        let mut reader = PacketReader {
            stream: server,
            compression: None,
        };

        let mut body = Vec::new();
        body.write_string("hello");
        writer.write_packet(0x0A, &body).await.unwrap();

        let (id, mut packet) = reader.read_frame().await.unwrap();
        assert_eq!(id, 0x0A);
        assert_eq!(packet.read_string().unwrap(), "hello");
    }

    #[tokio::test]
    async fn frames_round_trip_across_the_compression_threshold() {
        let (client, server) = tokio::io::duplex(8192);
        let mut writer = PacketWriter {
            stream: client,
            compression: Some(64),
        };
        let mut reader = PacketReader {
            stream: server,
            compression: Some(64),
        };

        // below the threshold: sent with the uncompressed marker
        let mut small = Vec::new();
        small.write_string("hi");
        writer.write_packet(0x01, &small).await.unwrap();

        // above the threshold: zlib compressed
        let long = "x".repeat(500);
        let mut big = Vec::new();
        big.write_string(&long);
        writer.write_packet(0x02, &big).await.unwrap();

        let (id, mut packet) = reader.read_frame().await.unwrap();
        assert_eq!(id, 0x01);
        assert_eq!(packet.read_string().unwrap(), "hi");

        let (id, mut packet) = reader.read_frame().await.unwrap();
        assert_eq!(id, 0x02);
        assert_eq!(packet.read_string().unwrap(), long);
    }

    #[tokio::test]
    async fn raw_frames_pass_through_untouched() {
        let (client, server) = tokio::io::duplex(4096);
        let mut writer = PacketWriter {
            stream: client,
            compression: None,
        };
        let mut reader = PacketReader {
            stream: server,
            compression: None,
        };

        // a raw save packet: the id byte is part of the caller's bytes
        let raw = [0x31, 0xAA, 0xBB, 0xCC];
        writer.write_frame(&raw).await.unwrap();

        let (id, mut packet) = reader.read_frame().await.unwrap();
        assert_eq!(id, 0x31);
        assert_eq!(packet.read_bytes(3).unwrap(), vec![0xAA, 0xBB, 0xCC]);
    }
}
