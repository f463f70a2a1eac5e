//! Incremental deanonymization for streamed model responses.
//!
//! A placeholder token can arrive split across two network chunks
//! (`...<PERS` then `ON_1>...`). Output is therefore withheld in a bounded
//! trailing buffer no larger than the longest possible token: a chunk is
//! released once its trailing boundary proves no token can span it, or at
//! stream end. If the client disconnects mid-stream the wrapper is simply
//! dropped — buffered content is discarded and the stored mapping is left
//! to expire on its own TTL.

use futures::{Stream, StreamExt};

use crate::common::mapping::SessionMapping;

use super::deanonymizer::Deanonymizer;

/// Extra bytes on top of the longest canonical token, covering bracket
/// swaps (`{{TYPE_N}}` is two bytes wider) and stray interior spacing.
const HOLDBACK_SLACK: usize = 8;

/// Floor for the holdback window so an empty mapping still reassembles
/// candidates for unresolved reporting.
const HOLDBACK_FLOOR: usize = 24;

/// Streaming rehydration engine.
///
/// Synchronous at its core — `feed` chunks in, withheld-safe text comes
/// out — so it composes with any transport. [`deanonymize_stream`] wraps it
/// over a `futures` stream.
#[derive(Debug)]
pub struct StreamingDeanonymizer {
    deanonymizer: Deanonymizer,
    mapping: SessionMapping,
    buffer: String,
    holdback: usize,
    replaced_count: usize,
    unresolved: Vec<String>,
}

impl StreamingDeanonymizer {
    pub fn new(deanonymizer: Deanonymizer, mapping: SessionMapping) -> Self {
        let holdback = mapping.max_token_len().max(HOLDBACK_FLOOR) + HOLDBACK_SLACK;
        Self {
            deanonymizer,
            mapping,
            buffer: String::new(),
            holdback,
            replaced_count: 0,
            unresolved: Vec::new(),
        }
    }

    /// Feed one chunk; returns rehydrated text proven free of split tokens.
    /// May return an empty string while a potential token straddles the
    /// buffer boundary.
    pub fn feed(&mut self, chunk: &str) -> String {
        self.buffer.push_str(chunk);
        let cut = self.release_boundary();
        if cut == 0 {
            return String::new();
        }
        let released: String = self.buffer.drain(..cut).collect();
        self.process(&released)
    }

    /// Flush whatever is still buffered. Called at stream end; anything
    /// unreleased at that point can no longer be completed by future input.
    pub fn finish(&mut self) -> String {
        if self.buffer.is_empty() {
            return String::new();
        }
        let rest = std::mem::take(&mut self.buffer);
        self.process(&rest)
    }

    /// Substituted occurrences so far, repeats included.
    pub fn replaced_count(&self) -> usize {
        self.replaced_count
    }

    /// Placeholder-like tokens seen so far that did not resolve.
    pub fn unresolved(&self) -> &[String] {
        &self.unresolved
    }

    pub fn is_complete(&self) -> bool {
        self.unresolved.is_empty()
    }

    fn process(&mut self, text: &str) -> String {
        let outcome = self.deanonymizer.deanonymize(text, &self.mapping);
        self.replaced_count += outcome.replaced_count;
        self.unresolved.extend(outcome.unresolved);
        outcome.restored_text
    }

    /// Byte offset up to which the buffer can be safely released.
    ///
    /// Within the trailing holdback window, the earliest bracket opener of
    /// each family with no later closer marks where a token could still
    /// begin; everything before the earliest such opener is safe. A closer
    /// clears its family because candidates never nest their own bracket
    /// kind — except braces, where only the `}}` pair closes a `{{` token.
    /// An opener held longer than the window can no longer be part of a
    /// token and falls out on a later call.
    fn release_boundary(&self) -> usize {
        let mut window_start = self.buffer.len().saturating_sub(self.holdback);
        while !self.buffer.is_char_boundary(window_start) {
            window_start += 1;
        }

        // Indices: 0 = angle, 1 = square, 2 = brace.
        let mut pending: [Option<usize>; 3] = [None; 3];
        let mut prev = self.buffer[..window_start].chars().next_back();
        for (offset, ch) in self.buffer[window_start..].char_indices() {
            let at = window_start + offset;
            match ch {
                '<' => {
                    if pending[0].is_none() {
                        pending[0] = Some(at);
                    }
                }
                '>' => pending[0] = None,
                '[' => {
                    if pending[1].is_none() {
                        pending[1] = Some(at);
                    }
                }
                ']' => pending[1] = None,
                '{' => {
                    if pending[2].is_none() {
                        pending[2] = Some(at);
                    }
                }
                '}' => {
                    if prev == Some('}') {
                        pending[2] = None;
                    }
                }
                _ => {}
            }
            prev = Some(ch);
        }

        pending
            .iter()
            .flatten()
            .copied()
            .min()
            .unwrap_or(self.buffer.len())
    }
}

/// Wrap a chunked text stream with incremental deanonymization.
///
/// Dropping the returned stream (client disconnect) drops the engine and
/// its buffered tail with it.
pub fn deanonymize_stream<S>(
    stream: S,
    deanonymizer: Deanonymizer,
    mapping: SessionMapping,
) -> impl Stream<Item = String>
where
    S: Stream<Item = String>,
{
    let engine = StreamingDeanonymizer::new(deanonymizer, mapping);
    futures::stream::unfold(
        (Box::pin(stream), Some(engine)),
        |(mut stream, mut engine)| async move {
            loop {
                let active = engine.as_mut()?;
                match stream.next().await {
                    Some(chunk) => {
                        let out = active.feed(&chunk);
                        if out.is_empty() {
                            continue;
                        }
                        return Some((out, (stream, engine)));
                    }
                    None => {
                        let tail = active.finish();
                        engine = None;
                        if tail.is_empty() {
                            return None;
                        }
                        return Some((tail, (stream, engine)));
                    }
                }
            }
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::types::EntityType;
    use futures::stream;

    fn sample_mapping() -> SessionMapping {
        let mut mapping = SessionMapping::new("s-1");
        mapping.placeholder_for_value(&EntityType::new("PERSON"), "张三");
        mapping.placeholder_for_value(&EntityType::new("PHONE"), "13800138000");
        mapping
    }

    fn run(chunks: &[&str]) -> (String, usize, Vec<String>) {
        let mut engine = StreamingDeanonymizer::new(Deanonymizer::new(true), sample_mapping());
        let mut out = String::new();
        for chunk in chunks {
            out.push_str(&engine.feed(chunk));
        }
        out.push_str(&engine.finish());
        (out, engine.replaced_count(), engine.unresolved().to_vec())
    }

    #[test]
    fn test_token_split_across_chunks() {
        let (out, replaced, unresolved) = run(&["你好<PERS", "ON_1>，再见"]);
        assert_eq!(out, "你好张三，再见");
        assert_eq!(replaced, 1);
        assert!(unresolved.is_empty());
    }

    #[test]
    fn test_token_split_one_byte_at_a_time() {
        let text = "<PERSON_1>的电话是<PHONE_1>";
        let chunks: Vec<String> = text.chars().map(|c| c.to_string()).collect();
        let mut engine = StreamingDeanonymizer::new(Deanonymizer::new(true), sample_mapping());
        let mut out = String::new();
        for chunk in &chunks {
            out.push_str(&engine.feed(chunk));
        }
        out.push_str(&engine.finish());
        assert_eq!(out, "张三的电话是13800138000");
        assert_eq!(engine.replaced_count(), 2);
    }

    #[test]
    fn test_plain_text_flows_through() {
        let (out, replaced, _) = run(&["no placeholders ", "in this stream"]);
        assert_eq!(out, "no placeholders in this stream");
        assert_eq!(replaced, 0);
    }

    #[test]
    fn test_lone_opener_is_eventually_released() {
        // "x < y" math-style text must not be held forever.
        let mut chunks = vec!["if x < y "];
        let filler = "then take the longer branch of the expression tree ";
        chunks.push(filler);
        let (out, _, _) = run(&chunks);
        assert_eq!(out, format!("if x < y {filler}"));
    }

    #[test]
    fn test_incomplete_token_at_stream_end_is_flushed() {
        let (out, replaced, _) = run(&["tail <PERS"]);
        assert_eq!(out, "tail <PERS");
        assert_eq!(replaced, 0);
    }

    #[test]
    fn test_unresolved_tracked_across_chunks() {
        let (out, _, unresolved) = run(&["see <PERS", "ON_7> now"]);
        assert_eq!(out, "see <PERSON_7> now");
        assert_eq!(unresolved, vec!["<PERSON_7>".to_string()]);
    }

    #[test]
    fn test_double_brace_split() {
        let (out, replaced, _) = run(&["{", "{PERSON_1}", "}"]);
        assert_eq!(out, "张三");
        assert_eq!(replaced, 1);
    }

    #[tokio::test]
    async fn test_stream_adapter() {
        let chunks = vec![
            "hello <PER".to_string(),
            "SON_1>, call <PHO".to_string(),
            "NE_1>".to_string(),
        ];
        let wrapped = deanonymize_stream(
            stream::iter(chunks),
            Deanonymizer::new(true),
            sample_mapping(),
        );
        let collected: Vec<String> = wrapped.collect().await;
        assert_eq!(collected.concat(), "hello 张三, call 13800138000");
    }

    #[tokio::test]
    async fn test_stream_adapter_empty_input() {
        let wrapped = deanonymize_stream(
            stream::iter(Vec::<String>::new()),
            Deanonymizer::new(true),
            sample_mapping(),
        );
        let collected: Vec<String> = wrapped.collect().await;
        assert!(collected.is_empty());
    }
}
