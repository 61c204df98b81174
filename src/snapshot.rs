//! The queue snapshot wire format (§6, §9): a hand-rolled tagged binary
//! layout replacing the original's pickle-based persistence so the format
//! is stable across implementations.
//!
//! Every timestamp in a `QueueEntry` is a monotonic [`std::time::Instant`],
//! meaningless across a process restart on its own. Snapshots instead
//! store each timestamp as a signed nanosecond offset from the `now`
//! passed to [`encode`], and [`decode`] reconstitutes absolute `Instant`s
//! relative to whatever `now` the restoring process supplies — so a
//! request with `next_eligible_ts` five seconds in the future at snapshot
//! time is still five seconds in the future after restore, regardless of
//! how long the process was down.

use crate::descriptor::{Headers, Method, RequestDescriptor, RetryOverrides};
use dispatch_queue::{Priority, QueueEntry};
use std::io::{self, Read};
use std::time::{Duration, Instant};
use uuid::Uuid;

const MAGIC: &[u8; 8] = b"QUEUE1\0\0";

fn offset_from(instant: Instant, reference: Instant) -> i64 {
    if instant >= reference {
        (instant - reference).as_nanos() as i64
    } else {
        -((reference - instant).as_nanos() as i64)
    }
}

fn instant_from_offset(offset: i64, reference: Instant) -> Instant {
    if offset >= 0 {
        reference + Duration::from_nanos(offset as u64)
    } else {
        reference - Duration::from_nanos((-offset) as u64)
    }
}

fn write_bytes(out: &mut Vec<u8>, bytes: &[u8]) {
    out.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
    out.extend_from_slice(bytes);
}

fn read_bytes(cursor: &mut impl Read) -> io::Result<Vec<u8>> {
    let mut len_buf = [0u8; 4];
    cursor.read_exact(&mut len_buf)?;
    let len = u32::from_be_bytes(len_buf) as usize;
    let mut buf = vec![0u8; len];
    cursor.read_exact(&mut buf)?;
    Ok(buf)
}

fn read_string(cursor: &mut impl Read) -> Result<String, &'static str> {
    let bytes = read_bytes(cursor).map_err(|_| "truncated string")?;
    String::from_utf8(bytes).map_err(|_| "invalid utf-8 in string field")
}

/// Serializes pending entries into the `QUEUE1\0\0` snapshot format,
/// expressing every timestamp as an offset from `now`.
pub fn encode(entries: &[QueueEntry<RequestDescriptor>], now: Instant) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&(entries.len() as u32).to_be_bytes());

    for entry in entries {
        out.extend_from_slice(entry.id.as_bytes());
        out.extend_from_slice(&offset_from(entry.payload.submitted_at, now).to_be_bytes());
        out.push(entry.priority as u8);
        write_bytes(&mut out, entry.payload.method.as_str().as_bytes());
        write_bytes(&mut out, entry.payload.url.as_bytes());

        let headers: Vec<(&str, &str)> = entry.payload.headers.iter().collect();
        out.extend_from_slice(&(headers.len() as u32).to_be_bytes());
        for (key, value) in headers {
            write_bytes(&mut out, key.as_bytes());
            write_bytes(&mut out, value.as_bytes());
        }

        match &entry.payload.body {
            Some(body) => {
                out.push(1);
                write_bytes(&mut out, body);
            }
            None => out.push(0),
        }

        out.extend_from_slice(&entry.attempt.to_be_bytes());
        out.extend_from_slice(&offset_from(entry.next_eligible_ts, now).to_be_bytes());
        out.extend_from_slice(&offset_from(entry.expiry_ts, now).to_be_bytes());
        out.extend_from_slice(&entry.sequence.to_be_bytes());
    }

    out
}

/// Deserializes a snapshot produced by [`encode`], anchoring every restored
/// timestamp to `now`. Returns `Err` on any structural corruption — the
/// caller is expected to discard the whole snapshot rather than salvage a
/// partial entry list (§6: "corrupted snapshots abort restore").
pub fn decode(bytes: &[u8], now: Instant) -> Result<Vec<QueueEntry<RequestDescriptor>>, &'static str> {
    let mut cursor = io::Cursor::new(bytes);

    let mut magic = [0u8; 8];
    cursor.read_exact(&mut magic).map_err(|_| "snapshot shorter than magic header")?;
    if &magic != MAGIC {
        return Err("bad magic header");
    }

    let mut count_buf = [0u8; 4];
    cursor.read_exact(&mut count_buf).map_err(|_| "truncated entry count")?;
    let count = u32::from_be_bytes(count_buf) as usize;

    let mut entries = Vec::with_capacity(count);
    for _ in 0..count {
        let mut id_buf = [0u8; 16];
        cursor.read_exact(&mut id_buf).map_err(|_| "truncated entry id")?;
        let id = Uuid::from_bytes(id_buf);

        let mut ts_buf = [0u8; 8];
        cursor.read_exact(&mut ts_buf).map_err(|_| "truncated submission timestamp")?;
        let submitted_at = instant_from_offset(i64::from_be_bytes(ts_buf), now);

        let mut priority_buf = [0u8; 1];
        cursor.read_exact(&mut priority_buf).map_err(|_| "truncated priority byte")?;
        let priority = Priority::from_u8(priority_buf[0]).ok_or("priority byte outside 0..=3")?;

        let method_str = read_string(&mut cursor)?;
        let method = parse_method(&method_str)?;
        let url = read_string(&mut cursor)?;

        let mut header_count_buf = [0u8; 4];
        cursor.read_exact(&mut header_count_buf).map_err(|_| "truncated header count")?;
        let header_count = u32::from_be_bytes(header_count_buf);
        let mut headers = Headers::new();
        for _ in 0..header_count {
            let key = read_string(&mut cursor)?;
            let value = read_string(&mut cursor)?;
            headers.insert(key, value);
        }

        let mut body_flag = [0u8; 1];
        cursor.read_exact(&mut body_flag).map_err(|_| "truncated body presence flag")?;
        let body = match body_flag[0] {
            0 => None,
            1 => Some(read_bytes(&mut cursor).map_err(|_| "truncated body")?),
            _ => return Err("invalid body presence flag"),
        };

        let mut attempt_buf = [0u8; 4];
        cursor.read_exact(&mut attempt_buf).map_err(|_| "truncated attempt count")?;
        let attempt = u32::from_be_bytes(attempt_buf);

        let mut next_buf = [0u8; 8];
        cursor.read_exact(&mut next_buf).map_err(|_| "truncated next_eligible_ts")?;
        let next_eligible_ts = instant_from_offset(i64::from_be_bytes(next_buf), now);

        let mut expiry_buf = [0u8; 8];
        cursor.read_exact(&mut expiry_buf).map_err(|_| "truncated expiry_ts")?;
        let expiry_ts = instant_from_offset(i64::from_be_bytes(expiry_buf), now);

        let mut sequence_buf = [0u8; 8];
        cursor.read_exact(&mut sequence_buf).map_err(|_| "truncated sequence")?;
        let sequence = u64::from_be_bytes(sequence_buf);

        let descriptor = RequestDescriptor {
            id,
            method,
            url,
            headers,
            body,
            timeout: Duration::from_secs(30),
            cache_key_override: None,
            retry_overrides: RetryOverrides::default(),
            priority,
            submitted_at,
            tags: Default::default(),
        };

        let mut entry = QueueEntry::new(id, priority, next_eligible_ts, expiry_ts, descriptor);
        entry.attempt = attempt;
        entry.sequence = sequence;
        entries.push(entry);
    }

    Ok(entries)
}

fn parse_method(s: &str) -> Result<Method, &'static str> {
    match s {
        "GET" => Ok(Method::Get),
        "POST" => Ok(Method::Post),
        "PUT" => Ok(Method::Put),
        "DELETE" => Ok(Method::Delete),
        "PATCH" => Ok(Method::Patch),
        "HEAD" => Ok(Method::Head),
        "OPTIONS" => Ok(Method::Options),
        _ => Err("unrecognized method string"),
    }
}
