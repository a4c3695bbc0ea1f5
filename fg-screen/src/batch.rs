//! Batch ingestion
//!
//! Turns loosely formatted CSV text into validated [`BatchRecord`]s, then
//! scores them with a single bulk call.
//!
//! Header cells are matched against fixed, case-insensitive alias lists,
//! once, so `id,Name,Amount,Card` and
//! `transaction_id,sender_name,TransactionAmt,card_id` resolve to the same
//! columns. Fields are comma separated; a field wrapped in double quotes
//! may contain commas and `""` escapes. Records cannot span lines.

use std::collections::HashMap;

use fg_common::api::{BatchRecord, Decision, ScreeningResult};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::client::ScoringService;
use crate::error::{BatchError, TransportError};

/// Most records accepted in one batch call
pub const MAX_BATCH_RECORDS: usize = 100;

/// Logical CSV fields and the header spellings accepted for each
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogicalField {
    TransactionId,
    SenderName,
    Amount,
    CardId,
    SenderCountry,
    ProductCode,
}

impl LogicalField {
    pub const REQUIRED: [LogicalField; 4] = [
        LogicalField::TransactionId,
        LogicalField::SenderName,
        LogicalField::Amount,
        LogicalField::CardId,
    ];

    pub const OPTIONAL: [LogicalField; 2] = [LogicalField::SenderCountry, LogicalField::ProductCode];

    pub fn name(&self) -> &'static str {
        match self {
            LogicalField::TransactionId => "transaction_id",
            LogicalField::SenderName => "sender_name",
            LogicalField::Amount => "amount",
            LogicalField::CardId => "card_id",
            LogicalField::SenderCountry => "sender_country",
            LogicalField::ProductCode => "product_code",
        }
    }

    /// Lower-case header spellings
    pub fn aliases(&self) -> &'static [&'static str] {
        match self {
            LogicalField::TransactionId => &["transaction_id", "transactionid", "txn_id", "id", "transaction id"],
            LogicalField::SenderName => &["sender_name", "sendername", "sender", "name", "sender name"],
            LogicalField::Amount => &["transactionamt", "amount", "transaction_amt", "amt"],
            LogicalField::CardId => &["card_id", "cardid", "card", "card1", "card id"],
            LogicalField::SenderCountry => &["sender_country", "sendercountry", "country"],
            LogicalField::ProductCode => &["product_code", "productcd", "product_cd", "product"],
        }
    }
}

/// Column positions resolved from the header row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnMap {
    pub transaction_id: usize,
    pub sender_name: usize,
    pub amount: usize,
    pub card_id: usize,
    /// Present only if the header has a matching column
    pub sender_country: Option<usize>,
    pub product_code: Option<usize>,
}

impl ColumnMap {
    /// Resolve logical fields from header cells; the first matching column wins
    pub fn resolve(header: &[String]) -> Result<Self, BatchError> {
        let normalized: Vec<String> = header.iter().map(|h| h.trim().to_lowercase()).collect();
        let find = |field: LogicalField| {
            normalized
                .iter()
                .position(|h| field.aliases().contains(&h.as_str()))
        };

        let missing: Vec<LogicalField> = LogicalField::REQUIRED
            .into_iter()
            .filter(|f| find(*f).is_none())
            .collect();
        if !missing.is_empty() {
            let details: Vec<String> = missing
                .iter()
                .map(|f| format!("{} (accepted headers: {})", f.name(), f.aliases().join(", ")))
                .collect();
            return Err(BatchError::format(format!(
                "Missing required column(s): {}",
                details.join("; ")
            )));
        }

        // Required fields were all found above
        let required = |field: LogicalField| find(field).unwrap_or_default();
        Ok(Self {
            transaction_id: required(LogicalField::TransactionId),
            sender_name: required(LogicalField::SenderName),
            amount: required(LogicalField::Amount),
            card_id: required(LogicalField::CardId),
            sender_country: find(LogicalField::SenderCountry),
            product_code: find(LogicalField::ProductCode),
        })
    }
}

/// Parse CSV text into a validated, non-empty batch of at most
/// [`MAX_BATCH_RECORDS`] records
///
/// Blank lines are ignored. Rows missing a transaction id, sender name or
/// card id are skipped. Any row whose amount is not a finite positive
/// number fails the whole batch with a row-addressable
/// [`BatchError::Format`]; row numbers count lines from 1, header included.
pub fn parse(raw_text: &str) -> Result<Vec<BatchRecord>, BatchError> {
    let text = raw_text.strip_prefix('\u{feff}').unwrap_or(raw_text);
    let lines: Vec<(usize, &str)> = text
        .lines()
        .enumerate()
        .map(|(i, line)| (i + 1, line))
        .filter(|(_, line)| !line.trim().is_empty())
        .collect();

    if lines.len() < 2 {
        return Err(BatchError::format(
            "CSV must contain a header row and at least one data row",
        ));
    }

    let (_, header_line) = lines[0];
    let columns = ColumnMap::resolve(&split_fields(header_line))?;
    debug!(?columns, "Resolved CSV columns");

    let mut records: Vec<BatchRecord> = Vec::new();
    let mut first_seen: HashMap<String, usize> = HashMap::new();
    let mut skipped = 0usize;

    for (data_index, &(line_no, line)) in lines[1..].iter().enumerate() {
        let cells = split_fields(line);
        let cell = |idx: usize| cells.get(idx).map(String::as_str).unwrap_or("");

        let transaction_id = cell(columns.transaction_id);
        let sender_name = cell(columns.sender_name);
        let card_id = cell(columns.card_id);
        if transaction_id.is_empty() || sender_name.is_empty() || card_id.is_empty() {
            warn!(row = line_no, "Skipping row with missing required values");
            skipped += 1;
            continue;
        }

        let raw_amount = cell(columns.amount);
        let amount = parse_amount(raw_amount).ok_or_else(|| {
            BatchError::format_at(
                line_no,
                format!("invalid amount \"{}\" (must be a positive number)", raw_amount),
            )
        })?;

        if let Some(first_row) = first_seen.insert(transaction_id.to_string(), line_no) {
            return Err(BatchError::format_at(
                line_no,
                format!(
                    "duplicate transaction_id \"{}\" (first seen on row {})",
                    transaction_id, first_row
                ),
            ));
        }

        let optional = |idx: Option<usize>| {
            idx.map(cell)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        records.push(BatchRecord {
            row_index: data_index + 1,
            transaction_id: transaction_id.to_string(),
            sender_name: sender_name.to_string(),
            amount,
            card_id: card_id.to_string(),
            sender_country: optional(columns.sender_country),
            product_code: optional(columns.product_code),
        });
    }

    if records.len() > MAX_BATCH_RECORDS {
        return Err(BatchError::TooManyRecords {
            limit: MAX_BATCH_RECORDS,
            found: records.len(),
        });
    }
    if records.is_empty() {
        return Err(BatchError::Empty);
    }

    info!(records = records.len(), skipped, "Parsed CSV batch");
    Ok(records)
}

/// Finite, strictly positive amount
fn parse_amount(raw: &str) -> Option<f64> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v > 0.0)
}

/// Split one line on commas, honoring double-quoted fields
///
/// Quotes are stripped, `""` inside quotes yields `"`, and every field is
/// trimmed.
fn split_fields(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes => {
                if chars.peek() == Some(&'"') {
                    current.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            }
            '"' if current.trim().is_empty() => {
                current.clear();
                in_quotes = true;
            }
            ',' if !in_quotes => {
                fields.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(c),
        }
    }
    fields.push(current.trim().to_string());
    fields
}

// ========================================
// Batch scoring
// ========================================

/// A record paired with its result
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredRecord {
    pub record: BatchRecord,
    pub result: ScreeningResult,
}

/// Counts over a scored batch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub approved: usize,
    pub review: usize,
    pub rejected: usize,
    pub sanctions_hits: usize,
    /// Records that got no result back
    pub missing: usize,
    /// Results whose transaction_id matched no record
    pub unmatched: usize,
}

/// Results of one batch call, in input order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchOutcome {
    pub scored: Vec<ScoredRecord>,
    pub missing: Vec<BatchRecord>,
    pub summary: BatchSummary,
}

/// Score a parsed batch with one bulk call
///
/// `records` is expected to come from [`parse`], which guarantees a
/// non-empty batch with unique transaction ids.
pub async fn score_batch(
    scorer: &dyn ScoringService,
    records: Vec<BatchRecord>,
) -> Result<BatchOutcome, TransportError> {
    info!(records = records.len(), "Submitting batch for scoring");
    let results = scorer.score_batch(&records).await?;
    Ok(correlate(records, results))
}

/// Pair records with results by transaction_id
pub fn correlate(records: Vec<BatchRecord>, results: Vec<ScreeningResult>) -> BatchOutcome {
    let mut by_id: HashMap<String, ScreeningResult> = HashMap::with_capacity(results.len());
    let mut unmatched = 0usize;
    for result in results {
        if by_id.contains_key(&result.correlation_id) {
            warn!(transaction_id = %result.correlation_id, "Duplicate result in batch response, keeping first");
            unmatched += 1;
            continue;
        }
        by_id.insert(result.correlation_id.clone(), result);
    }

    let mut summary = BatchSummary {
        total: records.len(),
        ..Default::default()
    };
    let mut scored = Vec::with_capacity(records.len());
    let mut missing = Vec::new();

    for record in records {
        match by_id.remove(&record.transaction_id) {
            Some(result) => {
                match result.decision {
                    Decision::Approve => summary.approved += 1,
                    Decision::Review => summary.review += 1,
                    Decision::Reject => summary.rejected += 1,
                }
                if result.sanctions_match {
                    summary.sanctions_hits += 1;
                }
                scored.push(ScoredRecord { record, result });
            }
            None => {
                warn!(transaction_id = %record.transaction_id, "No result returned for record");
                missing.push(record);
            }
        }
    }

    summary.missing = missing.len();
    summary.unmatched = unmatched + by_id.len();

    BatchOutcome {
        scored,
        missing,
        summary,
    }
}
