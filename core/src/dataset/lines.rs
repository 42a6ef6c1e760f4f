use serde::de::IgnoredAny;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{info, warn};

use super::FetchError;

const PROGRESS_EVERY: usize = 100;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LineStats {
    pub lines_read: usize,
    pub lines_saved: usize,
    pub lines_skipped: usize,
}

pub fn is_valid_json(line: &str) -> bool {
    serde_json::from_str::<IgnoredAny>(line).is_ok()
}

/// Copies lines that parse as JSON from `reader` to `writer`, byte for byte including
/// line terminators, until `max_lines` have been written or the input ends.
/// Malformed lines are skipped. No line is read once the ceiling is reached.
pub async fn copy_valid_lines<R, W>(
    mut reader: R,
    writer: &mut W,
    max_lines: usize,
) -> Result<LineStats, FetchError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut stats = LineStats::default();
    let mut buf: Vec<u8> = Vec::new();
    while stats.lines_saved < max_lines {
        buf.clear();
        let read = reader
            .read_until(b'\n', &mut buf)
            .await
            .map_err(FetchError::Read)?;
        if read == 0 {
            break;
        }
        stats.lines_read += 1;
        let line = std::str::from_utf8(&buf).map_err(|_| FetchError::Decode {
            line: stats.lines_read,
        })?;
        if is_valid_json(line) {
            writer.write_all(&buf).await.map_err(FetchError::Write)?;
            stats.lines_saved += 1;
            if stats.lines_saved % PROGRESS_EVERY == 0 {
                info!("Saved {} lines", stats.lines_saved);
            }
        } else {
            stats.lines_skipped += 1;
            warn!(
                line = stats.lines_read,
                "Skipping malformed line at count {}", stats.lines_saved
            );
        }
    }
    writer.flush().await.map_err(FetchError::Write)?;
    Ok(stats)
}

#[cfg(test)]
mod test {
    use std::{
        io,
        pin::Pin,
        task::{Context, Poll},
    };

    use claims::{assert_matches, assert_ok};
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use tokio_util::io::StreamReader;

    use super::*;

    /// Writer whose destination has gone away, like a full or unmounted disk.
    struct BrokenWriter;

    impl AsyncWrite for BrokenWriter {
        fn poll_write(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            _buf: &[u8],
        ) -> Poll<io::Result<usize>> {
            Poll::Ready(Err(io::Error::new(io::ErrorKind::BrokenPipe, "disk gone")))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    fn drawing(i: usize) -> String {
        format!(
            "{{\"word\":\"flower\",\"key_id\":\"{}\",\"drawing\":[[[0,{}],[1,2]]]}}\n",
            i, i
        )
    }

    /// NDJSON source with the given 1-based line numbers broken.
    fn source_with_malformed(total: usize, malformed: &[usize]) -> Vec<String> {
        (1..=total)
            .map(|i| {
                if malformed.contains(&i) {
                    format!("{{\"word\":\"flower\",\"key_id\":\"{}\",\n", i)
                } else {
                    drawing(i)
                }
            })
            .collect()
    }

    async fn run(input: &[u8], max_lines: usize) -> (Result<LineStats, FetchError>, Vec<u8>) {
        let mut out: Vec<u8> = Vec::new();
        let res = copy_valid_lines(input, &mut out, max_lines).await;
        (res, out)
    }

    #[tokio::test]
    async fn skips_malformed_lines_and_stops_at_ceiling() {
        let lines = source_with_malformed(600, &[37, 200]);
        let input = lines.concat();

        let (res, out) = run(input.as_bytes(), 500).await;
        let stats = assert_ok!(res);
        assert_eq!(
            stats,
            LineStats {
                lines_read: 502,
                lines_saved: 500,
                lines_skipped: 2,
            }
        );
        let expected: String = lines[..502]
            .iter()
            .enumerate()
            .filter(|(idx, _)| *idx + 1 != 37 && *idx + 1 != 200)
            .map(|(_, line)| line.as_str())
            .collect();
        let out = String::from_utf8(out).unwrap();
        assert_eq!(out, expected);
        assert_eq!(out.lines().count(), 500);
        assert!(out.lines().all(is_valid_json));
    }

    #[tokio::test]
    async fn short_source_writes_every_valid_line() {
        let lines = source_with_malformed(10, &[4]);
        let (res, out) = run(lines.concat().as_bytes(), 500).await;
        let stats = assert_ok!(res);
        assert_eq!(stats.lines_saved, 9);
        assert_eq!(stats.lines_read, 10);
        assert_eq!(String::from_utf8(out).unwrap().lines().count(), 9);
    }

    #[tokio::test]
    async fn output_is_byte_identical() {
        let input = b"{\"a\":1}\r\n  [1, 2,3]  \nnot json\n\"last\"";
        let (res, out) = run(input, 10).await;
        assert_eq!(assert_ok!(res).lines_saved, 3);
        assert_eq!(out, b"{\"a\":1}\r\n  [1, 2,3]  \n\"last\"".to_vec());
    }

    #[tokio::test]
    async fn blank_lines_are_malformed() {
        let (res, out) = run(b"\n{}\n\n", 10).await;
        let stats = assert_ok!(res);
        assert_eq!(stats.lines_saved, 1);
        assert_eq!(stats.lines_skipped, 2);
        assert_eq!(out, b"{}\n".to_vec());
    }

    #[tokio::test]
    async fn zero_ceiling_reads_nothing() {
        let (res, out) = run(b"{}\n{}\n", 0).await;
        assert_eq!(assert_ok!(res), LineStats::default());
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn invalid_utf8_is_fatal() {
        let (res, _out) = run(b"{}\n\"\xff\xfe\"\n{}\n", 10).await;
        assert_matches!(res, Err(FetchError::Decode { line: 2 }));
    }

    #[tokio::test]
    async fn connection_drop_mid_stream_is_a_read_error() {
        let chunks: Vec<io::Result<&[u8]>> = vec![
            Ok(&b"{}\n[1]\n"[..]),
            Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset by peer")),
            Ok(&b"[2]\n"[..]),
        ];
        let reader = StreamReader::new(futures::stream::iter(chunks));
        let mut out: Vec<u8> = Vec::new();

        let res = copy_valid_lines(reader, &mut out, 500).await;
        match res {
            Err(FetchError::Read(err)) => assert_eq!(err.kind(), io::ErrorKind::ConnectionReset),
            other => panic!("expected a read error, got {:?}", other),
        }
        assert_eq!(out, b"{}\n[1]\n".to_vec());
    }

    #[tokio::test]
    async fn failing_output_is_a_write_error() {
        let res = copy_valid_lines(&b"not json\n{}\n"[..], &mut BrokenWriter, 10).await;
        match res {
            Err(FetchError::Write(err)) => assert_eq!(err.kind(), io::ErrorKind::BrokenPipe),
            other => panic!("expected a write error, got {:?}", other),
        }
    }

    #[test]
    fn json_validation() {
        assert!(is_valid_json("{\"word\":\"flower\"}\n"));
        assert!(is_valid_json("42"));
        assert!(is_valid_json("null"));
        assert!(!is_valid_json(""));
        assert!(!is_valid_json("{\"word\":"));
        assert!(!is_valid_json("{} {}"));
    }

    proptest! {
        #[test]
        fn prop_never_exceeds_ceiling(
            valid in prop::collection::vec(any::<bool>(), 0..200),
            max_lines in 0usize..150,
        ) {
            let input: String = valid
                .iter()
                .enumerate()
                .map(|(i, ok)| if *ok { drawing(i) } else { format!("[{},\n", i) })
                .collect();
            let mut out: Vec<u8> = Vec::new();
            let res = futures::executor::block_on(copy_valid_lines(input.as_bytes(), &mut out, max_lines));
            prop_assert!(res.is_ok());
            let stats = res.unwrap();
            let valid_count = valid.iter().filter(|ok| **ok).count();
            prop_assert_eq!(stats.lines_saved, valid_count.min(max_lines));
            let out = String::from_utf8(out).unwrap();
            prop_assert_eq!(out.lines().count(), stats.lines_saved);
            prop_assert!(out.lines().all(is_valid_json));
        }
    }
}
