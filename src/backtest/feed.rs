//! Historical feed reader
//!
//! Parses the two flat files a backtest runs on: a depth-snapshot file and
//! a trade-tape file. Both are comma-separated with a header line. Prices
//! and volumes are decimal text parsed into fixed-point integers with
//! exactly five fractional digits; timestamps are plain integers in
//! milliseconds.

use crate::backtest::error::BacktestError;
use crate::backtest::snapshot::{DepthLevel, DepthSnapshot};
use crate::backtest::trade::Trade;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::info;

/// Levels recorded per side in every snapshot row.
const DEPTH: usize = 50;
/// `[_, timestamp, ask_price×50, ask_volume×50, bid_price×50, bid_volume×50]`
const SNAPSHOT_FIELDS: usize = 2 + 4 * DEPTH;
/// `[_, timestamp, volume, price, is_buyer_maker]`
const TRADE_FIELDS: usize = 5;
/// Fractional digits of the fixed-point representation.
const PRICE_DECIMALS: usize = 5;

/// The fully parsed historical inputs of one backtest run.
#[derive(Debug, Clone)]
pub struct Feed {
    snapshots: Vec<DepthSnapshot>,
    trades: Vec<Trade>,
}

impl Feed {
    /// Read and parse both input files.
    ///
    /// # Errors
    ///
    /// Any I/O failure or malformed row/field is fatal; see
    /// [`BacktestError`].
    pub fn read(
        snapshot_path: impl AsRef<Path>,
        trades_path: impl AsRef<Path>,
    ) -> Result<Self, BacktestError> {
        let snapshots = Self::read_snapshots(snapshot_path)?;
        let trades = Self::read_trades(trades_path)?;
        info!(
            snapshots = snapshots.len(),
            trades = trades.len(),
            "historical feed loaded"
        );
        Ok(Self { snapshots, trades })
    }

    /// Parse a depth-snapshot file.
    ///
    /// # Errors
    ///
    /// Fails on I/O errors, rows that do not carry exactly 202 fields, and
    /// unparseable numbers.
    pub fn read_snapshots(path: impl AsRef<Path>) -> Result<Vec<DepthSnapshot>, BacktestError> {
        let path = path.as_ref();
        let mut snapshots = Vec::new();
        for (line_no, line) in read_data_lines(path)? {
            let fields = split_fields(&line);
            if fields.is_empty() {
                continue;
            }
            if fields.len() != SNAPSHOT_FIELDS {
                return Err(BacktestError::MalformedRow {
                    path: path.display().to_string(),
                    line: line_no,
                    expected: SNAPSHOT_FIELDS,
                    found: fields.len(),
                });
            }
            let timestamp = parse_integer(fields[1], path, line_no)?;
            let mut asks = Vec::with_capacity(DEPTH);
            let mut bids = Vec::with_capacity(DEPTH);
            for i in 0..DEPTH {
                asks.push(DepthLevel {
                    price: parse_fixed(fields[2 + i], path, line_no)?,
                    volume: parse_fixed(fields[2 + DEPTH + i], path, line_no)?,
                });
                bids.push(DepthLevel {
                    price: parse_fixed(fields[2 + 2 * DEPTH + i], path, line_no)?,
                    volume: parse_fixed(fields[2 + 3 * DEPTH + i], path, line_no)?,
                });
            }
            snapshots.push(DepthSnapshot {
                timestamp,
                asks,
                bids,
            });
        }
        Ok(snapshots)
    }

    /// Parse a trade-tape file.
    ///
    /// # Errors
    ///
    /// Fails on I/O errors, rows that do not carry exactly 5 fields, and
    /// unparseable numbers or booleans.
    pub fn read_trades(path: impl AsRef<Path>) -> Result<Vec<Trade>, BacktestError> {
        let path = path.as_ref();
        let mut trades = Vec::new();
        for (line_no, line) in read_data_lines(path)? {
            let fields = split_fields(&line);
            if fields.is_empty() {
                continue;
            }
            if fields.len() != TRADE_FIELDS {
                return Err(BacktestError::MalformedRow {
                    path: path.display().to_string(),
                    line: line_no,
                    expected: TRADE_FIELDS,
                    found: fields.len(),
                });
            }
            trades.push(Trade::new(
                parse_integer(fields[1], path, line_no)?,
                parse_fixed(fields[2], path, line_no)?,
                parse_fixed(fields[3], path, line_no)?,
                parse_flag(fields[4], path, line_no)?,
            ));
        }
        Ok(trades)
    }

    /// Parsed snapshots in file order.
    #[must_use]
    pub fn snapshots(&self) -> &[DepthSnapshot] {
        &self.snapshots
    }

    /// Parsed trades in file order.
    #[must_use]
    pub fn trades(&self) -> &[Trade] {
        &self.trades
    }

    /// Split into the two vectors, consuming the feed.
    #[must_use]
    pub fn into_parts(self) -> (Vec<DepthSnapshot>, Vec<Trade>) {
        (self.snapshots, self.trades)
    }
}

/// Read every data line of `path`, skipping the header, paired with its
/// 1-based line number.
fn read_data_lines(path: &Path) -> Result<Vec<(usize, String)>, BacktestError> {
    let file = File::open(path).map_err(|source| BacktestError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let mut lines = Vec::new();
    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|source| BacktestError::Io {
            path: path.display().to_string(),
            source,
        })?;
        // first line is the header
        if index == 0 {
            continue;
        }
        lines.push((index + 1, line));
    }
    Ok(lines)
}

/// Comma-split, dropping empty tokens.
fn split_fields(line: &str) -> Vec<&str> {
    line.split(',').filter(|field| !field.is_empty()).collect()
}

/// Parse a decimal token into fixed-point with [`PRICE_DECIMALS`]
/// fractional digits, zero-padding shorter fractions.
fn parse_fixed(text: &str, path: &Path, line: usize) -> Result<u64, BacktestError> {
    let malformed = || BacktestError::MalformedNumber {
        path: path.display().to_string(),
        line,
        text: text.to_string(),
    };
    let mut value: u64 = 0;
    let mut seen_digit = false;
    let mut decimals: Option<usize> = None;
    for c in text.chars() {
        match c {
            '.' => {
                if decimals.is_some() {
                    return Err(malformed());
                }
                decimals = Some(0);
            }
            '0'..='9' => {
                seen_digit = true;
                if let Some(count) = decimals.as_mut() {
                    *count += 1;
                    if *count > PRICE_DECIMALS {
                        return Err(malformed());
                    }
                }
                value = value
                    .checked_mul(10)
                    .and_then(|v| v.checked_add((c as u8 - b'0') as u64))
                    .ok_or_else(malformed)?;
            }
            _ => return Err(malformed()),
        }
    }
    if !seen_digit {
        return Err(malformed());
    }
    for _ in decimals.unwrap_or(0)..PRICE_DECIMALS {
        value = value.checked_mul(10).ok_or_else(malformed)?;
    }
    Ok(value)
}

/// Parse an unscaled integer token (timestamps).
fn parse_integer(text: &str, path: &Path, line: usize) -> Result<u64, BacktestError> {
    text.parse().map_err(|_| BacktestError::MalformedNumber {
        path: path.display().to_string(),
        line,
        text: text.to_string(),
    })
}

/// Parse the tape's `True`/`False` aggressor flag.
fn parse_flag(text: &str, path: &Path, line: usize) -> Result<bool, BacktestError> {
    match text {
        "True" => Ok(true),
        "False" => Ok(false),
        _ => Err(BacktestError::MalformedBool {
            path: path.display().to_string(),
            line,
            text: text.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_file(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    fn fixed(text: &str) -> u64 {
        parse_fixed(text, Path::new("test"), 1).unwrap()
    }

    #[test]
    fn test_parse_fixed_pads_to_five_decimals() {
        assert_eq!(fixed("12.345"), 1_234_500);
        assert_eq!(fixed("12"), 1_200_000);
        assert_eq!(fixed("0.00001"), 1);
        assert_eq!(fixed("4075.2"), 407_520_000);
    }

    #[test]
    fn test_parse_fixed_rejects_junk() {
        for text in ["", ".", "1.2.3", "-1", "1e5", "12.345678"] {
            assert!(
                parse_fixed(text, Path::new("test"), 1).is_err(),
                "accepted {text:?}"
            );
        }
    }

    #[test]
    fn test_read_trades_parses_rows() {
        let file = write_file(
            "id,time,qty,price,is_buyer_maker\n\
             0,1603659600000,0.02,4075.1,True\n\
             1,1603659600250,1,4075.2,False\n",
        );
        let trades = Feed::read_trades(file.path()).unwrap();
        assert_eq!(trades.len(), 2);
        assert_eq!(
            trades[0],
            Trade::new(1_603_659_600_000, 2_000, 407_510_000, true)
        );
        assert_eq!(
            trades[1],
            Trade::new(1_603_659_600_250, 100_000, 407_520_000, false)
        );
    }

    #[test]
    fn test_read_trades_rejects_short_rows() {
        let file = write_file("header\n0,100,0.5,True\n");
        let err = Feed::read_trades(file.path()).unwrap_err();
        assert!(matches!(
            err,
            BacktestError::MalformedRow {
                expected: 5,
                found: 4,
                ..
            }
        ));
    }

    #[test]
    fn test_read_trades_rejects_bad_flag() {
        let file = write_file("header\n0,100,0.5,4075.1,yes\n");
        let err = Feed::read_trades(file.path()).unwrap_err();
        assert!(matches!(err, BacktestError::MalformedBool { .. }));
    }

    #[test]
    fn test_read_snapshots_parses_full_depth() {
        let mut row = String::from("0,1603659600000");
        for i in 0..DEPTH {
            row.push_str(&format!(",{}", 4075 + i)); // ask prices
        }
        for _ in 0..DEPTH {
            row.push_str(",0.1"); // ask volumes
        }
        for i in 0..DEPTH {
            row.push_str(&format!(",{}", 4074 - i)); // bid prices
        }
        for _ in 0..DEPTH {
            row.push_str(",0.2"); // bid volumes
        }
        let file = write_file(&format!("header\n{row}\n"));
        let snapshots = Feed::read_snapshots(file.path()).unwrap();
        assert_eq!(snapshots.len(), 1);

        let snapshot = &snapshots[0];
        assert_eq!(snapshot.timestamp, 1_603_659_600_000);
        assert_eq!(snapshot.asks.len(), DEPTH);
        assert_eq!(snapshot.bids.len(), DEPTH);
        assert_eq!(snapshot.asks[0].price, 407_500_000);
        assert_eq!(snapshot.asks[0].volume, 10_000);
        assert_eq!(snapshot.bids[0].price, 407_400_000);
        assert_eq!(snapshot.bids[0].volume, 20_000);
        assert_eq!(snapshot.bids[49].price, (4074 - 49) * 100_000);
    }

    #[test]
    fn test_read_snapshots_rejects_wrong_width() {
        let file = write_file("header\n0,100,4075.1,0.5\n");
        let err = Feed::read_snapshots(file.path()).unwrap_err();
        assert!(matches!(err, BacktestError::MalformedRow { expected, .. } if expected == SNAPSHOT_FIELDS));
    }

    #[test]
    fn test_blank_lines_are_skipped() {
        let file = write_file("header\n\n0,100,0.5,4075.1,True\n\n");
        let trades = Feed::read_trades(file.path()).unwrap();
        assert_eq!(trades.len(), 1);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = Feed::read_trades("/nonexistent/trades.csv").unwrap_err();
        assert!(matches!(err, BacktestError::Io { .. }));
    }
}
