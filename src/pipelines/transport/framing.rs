// SPDX-License-Identifier: GPL-3.0-only

//! Message framing on a TCP stream
//!
//! `LengthPrefixed`: 4-byte big-endian length, then the body.
//! `Raw`: the body alone, terminated by the sender closing its write half.

use crate::errors::{TransportError, TransportResult};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Framing {
    #[default]
    LengthPrefixed,
    Raw,
}

impl Framing {
    /// Default read bound for this framing
    pub fn default_limit(&self) -> usize {
        use crate::constants::transport::{MAX_FRAME_LEN, RAW_READ_LIMIT};
        match self {
            Framing::LengthPrefixed => MAX_FRAME_LEN,
            Framing::Raw => RAW_READ_LIMIT,
        }
    }
}

impl std::fmt::Display for Framing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Framing::LengthPrefixed => write!(f, "length-prefixed"),
            Framing::Raw => write!(f, "raw"),
        }
    }
}

impl std::str::FromStr for Framing {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "length-prefixed" | "length_prefixed" => Ok(Framing::LengthPrefixed),
            "raw" => Ok(Framing::Raw),
            other => Err(format!(
                "unknown framing '{}' (expected length-prefixed or raw)",
                other
            )),
        }
    }
}

/// Write one framed message
pub async fn write_frame<W>(writer: &mut W, framing: Framing, body: &[u8], limit: usize) -> TransportResult<()>
where
    W: AsyncWrite + Unpin,
{
    if body.len() > limit {
        return Err(TransportError::FrameTooLarge {
            size: body.len(),
            limit,
        });
    }
    if framing == Framing::LengthPrefixed {
        let len = u32::try_from(body.len()).map_err(|_| TransportError::FrameTooLarge {
            size: body.len(),
            limit: u32::MAX as usize,
        })?;
        writer.write_u32(len).await?;
    }
    writer.write_all(body).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one framed message of at most `limit` bytes
pub async fn read_frame<R>(reader: &mut R, framing: Framing, limit: usize) -> TransportResult<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    match framing {
        Framing::LengthPrefixed => {
            let len = reader.read_u32().await? as usize;
            if len > limit {
                return Err(TransportError::FrameTooLarge { size: len, limit });
            }
            let mut body = vec![0u8; len];
            reader.read_exact(&mut body).await?;
            Ok(body)
        }
        Framing::Raw => {
            let mut body = Vec::new();
            // One extra byte tells "exactly at the limit" from "over it"
            reader
                .take(limit as u64 + 1)
                .read_to_end(&mut body)
                .await?;
            if body.len() > limit {
                return Err(TransportError::FrameTooLarge {
                    size: body.len(),
                    limit,
                });
            }
            Ok(body)
        }
    }
}
