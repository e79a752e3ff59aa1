use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use foliobot_common::{Error, Result};

pub(crate) fn embedding_to_blob(embedding: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(embedding.len() * 4);
    for v in embedding {
        bytes.extend(v.to_le_bytes());
    }
    bytes
}

pub(crate) fn blob_to_embedding(blob: &[u8]) -> Result<Vec<f32>> {
    if blob.len() % 4 != 0 {
        return Err(Error::Store("invalid embedding blob length".into()));
    }

    let mut out = Vec::with_capacity(blob.len() / 4);
    for chunk in blob.chunks_exact(4) {
        out.push(f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]));
    }
    Ok(out)
}

/// Fixed-width UTC timestamp so lexical order in SQLite matches time order.
pub(crate) fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }

    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Ok(DateTime::<Utc>::from_naive_utc_and_offset(naive, Utc));
    }

    Err(Error::Store(format!("invalid timestamp format: {raw}")))
}

/// Wrap a domain error so it can surface from a rusqlite row mapper.
pub(crate) fn row_error(e: Error) -> rusqlite::Error {
    rusqlite::Error::ToSqlConversionFailure(Box::new(std::io::Error::other(e.to_string())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blob_round_trip_preserves_values() {
        let v = vec![0.25_f32, -1.5, 3.0];
        let decoded = blob_to_embedding(&embedding_to_blob(&v)).unwrap();
        assert_eq!(decoded, v);
    }

    #[test]
    fn rejects_truncated_blob() {
        assert!(blob_to_embedding(&[0, 1, 2]).is_err());
    }

    #[test]
    fn parses_sqlite_datetime_format() {
        let ts = parse_timestamp("2024-05-01 10:20:30").unwrap();
        assert_eq!(ts.to_rfc3339(), "2024-05-01T10:20:30+00:00");
    }
}
