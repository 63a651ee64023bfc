// 🧩 Structured Markup Extractor - holdings from parsed HTML
//
// Three fallback passes, strict order, each only while < 10 entries:
//   (i)   <table> with a name column AND a code column
//   (ii)  <dl> label/value blocks (rank from nearby preceding text)
//   (iii) <script> payloads: name/code key-value pairs, either order
//
// Entries carry the document's own code, so the resolver is bypassed.

use super::{squash_whitespace, HoldingCandidate, HoldingsExtractor, MAX_HOLDINGS};
use crate::config::{ExtractionConfig, ExtractorKind, MarkupAliases};
use crate::document::{DocumentForm, ReportDocument};
use crate::error::{HoldingsError, Result};
use crate::text::{digits_only, parse_rank};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use tracing::debug;

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css)
        .map_err(|e| HoldingsError::Document(format!("invalid selector '{}': {:?}", css, e)))
}

fn element_text(element: &ElementRef<'_>) -> String {
    squash_whitespace(&element.text().collect::<String>())
}

fn contains_any(text: &str, aliases: &[String]) -> bool {
    aliases.iter().any(|a| !a.is_empty() && text.contains(a.as_str()))
}

/// 4-digit security code, or None
fn security_code(raw: &str) -> Option<String> {
    let code = digits_only(raw);
    if code.len() == 4 {
        Some(code)
    } else {
        None
    }
}

// ============================================================================
// ACCUMULATOR
// ============================================================================

/// Running result set shared by the three passes (dedup by code)
#[derive(Default)]
struct Accumulator {
    entries: Vec<HoldingCandidate>,
    codes: HashSet<String>,
}

impl Accumulator {
    fn push(&mut self, rank: Option<u8>, name: &str, code: &str) {
        let name = squash_whitespace(name);
        if name.is_empty() || self.codes.contains(code) {
            return;
        }

        // A rank is never shared by two holdings
        let rank = rank.filter(|r| !self.entries.iter().any(|e| e.rank == Some(*r)));

        self.codes.insert(code.to_string());
        self.entries
            .push(HoldingCandidate::new(rank, &name).with_code(code));
    }

    fn is_full(&self) -> bool {
        self.entries.len() >= MAX_HOLDINGS
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    /// No ranks at all → discovery order. Otherwise sort by rank, unranked last.
    fn finish(self) -> Vec<HoldingCandidate> {
        let mut entries = self.entries;

        if entries.iter().all(|e| e.rank.is_none()) {
            entries.truncate(MAX_HOLDINGS);
            for (i, entry) in entries.iter_mut().enumerate() {
                entry.rank = Some(i as u8 + 1);
            }
        } else {
            // Stable: equal keys keep discovery order
            entries.sort_by_key(|e| (e.rank.is_none(), e.rank));
            entries.truncate(MAX_HOLDINGS);
        }

        entries
    }
}

// ============================================================================
// PASS (i): TABLES
// ============================================================================

/// Column positions detected from a header row
#[derive(Debug, PartialEq)]
struct HeaderColumns {
    name: usize,
    code: usize,
    rank: Option<usize>,
}

impl HeaderColumns {
    fn detect(header: &[String], aliases: &MarkupAliases) -> Option<Self> {
        // Code first: "銘柄コード" also contains the name alias "銘柄"
        let code = header
            .iter()
            .position(|h| contains_any(h, &aliases.code_headers))?;
        let name = header
            .iter()
            .enumerate()
            .position(|(i, h)| i != code && contains_any(h, &aliases.name_headers))?;
        let rank = header.iter().enumerate().position(|(i, h)| {
            i != code && i != name && contains_any(h, &aliases.rank_headers)
        });

        Some(HeaderColumns { name, code, rank })
    }
}

fn table_pass(html: &Html, aliases: &MarkupAliases, acc: &mut Accumulator) -> Result<()> {
    let table_sel = selector("table")?;
    let row_sel = selector("tr")?;
    let cell_sel = selector("th, td")?;

    for table in html.select(&table_sel) {
        let rows: Vec<Vec<String>> = table
            .select(&row_sel)
            .map(|tr| tr.select(&cell_sel).map(|c| element_text(&c)).collect::<Vec<_>>())
            .filter(|cells| !cells.is_empty())
            .collect();

        let (header, body) = match rows.split_first() {
            Some(split) => split,
            None => continue,
        };
        let columns = match HeaderColumns::detect(header, aliases) {
            Some(c) => c,
            None => continue,
        };

        for row in body {
            let code = match row.get(columns.code).and_then(|c| security_code(c)) {
                Some(code) => code,
                None => continue,
            };
            let name = match row.get(columns.name) {
                Some(n) if !n.is_empty() => n,
                _ => continue,
            };
            let rank = match columns.rank {
                Some(i) => row.get(i).and_then(|c| parse_rank(c)),
                None => row.first().and_then(|c| parse_rank(c)),
            };

            acc.push(rank, name, &code);
        }
    }

    Ok(())
}

// ============================================================================
// PASS (ii): LABEL/VALUE BLOCKS
// ============================================================================

/// Last whitespace-separated token that reads as a rank ("3", "３", "3位")
fn standalone_rank(text: &str) -> Option<u8> {
    text.split_whitespace()
        .filter(|token| token.chars().filter(|c| c.is_numeric()).count() <= 2)
        .filter_map(parse_rank)
        .last()
}

/// Rank from the nearest non-blank preceding siblings of the block,
/// then of its parent
fn preceding_rank(block: ElementRef<'_>) -> Option<u8> {
    let mut current = Some(*block);

    for _level in 0..2 {
        let node = current?;
        let mut inspected = 0;

        for sibling in node.prev_siblings() {
            let text = match ElementRef::wrap(sibling) {
                Some(element) => element.text().collect::<String>(),
                None => sibling
                    .value()
                    .as_text()
                    .map(|t| {
                        let s: &str = t;
                        s.to_string()
                    })
                    .unwrap_or_default(),
            };
            if text.trim().is_empty() {
                continue;
            }
            if let Some(rank) = standalone_rank(&text) {
                return Some(rank);
            }
            inspected += 1;
            if inspected >= 3 {
                break;
            }
        }

        current = node.parent();
    }

    None
}

fn block_pass(html: &Html, aliases: &MarkupAliases, acc: &mut Accumulator) -> Result<()> {
    let dl_sel = selector("dl")?;
    let field_sel = selector("dt, dd")?;

    for dl in html.select(&dl_sel) {
        let mut name: Option<String> = None;
        let mut code: Option<String> = None;
        let mut label: Option<String> = None;

        // dt/dd in document order; also covers <div>-grouped pairs
        for field in dl.select(&field_sel) {
            match field.value().name() {
                "dt" => label = Some(element_text(&field)),
                "dd" => {
                    let heading = match label.take() {
                        Some(l) => l,
                        None => continue,
                    };
                    let value = element_text(&field);
                    if contains_any(&heading, &aliases.code_headers) {
                        if code.is_none() {
                            code = security_code(&value);
                        }
                    } else if contains_any(&heading, &aliases.name_headers) && name.is_none() {
                        name = Some(value);
                    }
                }
                _ => {}
            }
        }

        if let (Some(name), Some(code)) = (name, code) {
            acc.push(preceding_rank(dl), &name, &code);
        }
    }

    Ok(())
}

// ============================================================================
// PASS (iii): SCRIPT PAYLOADS
// ============================================================================

/// Name/code pair patterns in both orders
struct ScriptPatterns {
    name_then_code: Regex,
    code_then_name: Regex,
}

impl ScriptPatterns {
    fn new(aliases: &MarkupAliases) -> Result<Self> {
        fn alternation(keys: &[String]) -> String {
            keys.iter()
                .filter(|k| !k.is_empty())
                .map(|k| regex::escape(k))
                .collect::<Vec<_>>()
                .join("|")
        }

        // "name": "トヨタ自動車"  |  name: 'トヨタ自動車'  |  name="..."
        let name_pair = format!(
            r#"(?:^|[^A-Za-z0-9_])["']?(?:{})["']?\s*[:=]\s*["']([^"'\\<>]{{1,80}})["']"#,
            alternation(&aliases.name_keys)
        );
        // "code": "7203"  |  code: 7203
        let code_pair = format!(
            r#"(?:^|[^A-Za-z0-9_])["']?(?:{})["']?\s*[:=]\s*["']?([0-9]{{4}})\b"#,
            alternation(&aliases.code_keys)
        );
        let gap = aliases.script_gap;

        let build = |pattern: String| {
            Regex::new(&pattern).map_err(|e| {
                HoldingsError::Configuration(format!("invalid script key aliases: {}", e))
            })
        };

        // The gap never crosses an object/array boundary
        Ok(ScriptPatterns {
            name_then_code: build(format!(r"{}[^{{}}\[\]]{{0,{}}}?{}", name_pair, gap, code_pair))?,
            code_then_name: build(format!(r"{}[^{{}}\[\]]{{0,{}}}?{}", code_pair, gap, name_pair))?,
        })
    }
}

fn script_pass(html: &Html, aliases: &MarkupAliases, acc: &mut Accumulator) -> Result<()> {
    if aliases.name_keys.iter().all(|k| k.is_empty()) || aliases.code_keys.iter().all(|k| k.is_empty()) {
        return Ok(());
    }

    let script_sel = selector("script")?;
    let patterns = ScriptPatterns::new(aliases)?;
    let payloads: Vec<String> = html
        .select(&script_sel)
        .map(|s| s.text().collect::<String>())
        .filter(|body| !body.trim().is_empty())
        .collect();

    // (payload, offset, name, code): both key orders merged into document order
    let mut pairs: Vec<(usize, usize, String, String)> = Vec::new();
    for (index, payload) in payloads.iter().enumerate() {
        for caps in patterns.name_then_code.captures_iter(payload) {
            let start = caps.get(0).map_or(0, |m| m.start());
            pairs.push((index, start, caps[1].to_string(), caps[2].to_string()));
        }
        for caps in patterns.code_then_name.captures_iter(payload) {
            let start = caps.get(0).map_or(0, |m| m.start());
            pairs.push((index, start, caps[2].to_string(), caps[1].to_string()));
        }
    }
    pairs.sort_by_key(|(index, start, _, _)| (*index, *start));

    for (_, _, name, code) in &pairs {
        acc.push(None, name, code);
    }

    Ok(())
}

// ============================================================================
// EXTRACTOR
// ============================================================================

pub struct StructuredMarkupExtractor;

impl StructuredMarkupExtractor {
    pub fn new() -> Self {
        StructuredMarkupExtractor
    }

    pub fn extract_from_html(&self, html: &Html, config: &ExtractionConfig) -> Result<Vec<HoldingCandidate>> {
        let aliases = &config.markup;
        let mut acc = Accumulator::default();

        table_pass(html, aliases, &mut acc)?;
        debug!(entries = acc.len(), "markup table pass");

        if !acc.is_full() {
            block_pass(html, aliases, &mut acc)?;
            debug!(entries = acc.len(), "markup block pass");
        }

        if !acc.is_full() {
            script_pass(html, aliases, &mut acc)?;
            debug!(entries = acc.len(), "markup script pass");
        }

        Ok(acc.finish())
    }
}

impl Default for StructuredMarkupExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl HoldingsExtractor for StructuredMarkupExtractor {
    fn extract(
        &self,
        document: &ReportDocument,
        config: &ExtractionConfig,
    ) -> Result<Vec<HoldingCandidate>> {
        self.extract_from_html(document.markup()?, config)
    }

    fn kind(&self) -> ExtractorKind {
        ExtractorKind::StructuredMarkup
    }

    fn form(&self) -> DocumentForm {
        DocumentForm::Markup
    }
}

// ============================================================================
// TESTS
// ============================================================================
