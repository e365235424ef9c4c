//! Terms aggregation over the term dictionary of one field.

use std::{
    collections::{BTreeMap, BTreeSet},
    io, str,
};

use regex::Regex;
use tantivy::{
    DocAddress, DocId, DocSet, InvertedIndexReader, Searcher, SegmentReader, TERMINATED,
    postings::TermInfo,
    schema::{Field, IndexRecordOption},
};

use crate::{error::BackendError, response::Bucket};

/// Buckets returned by a terms aggregation.
pub(super) const TERMS_SIZE: usize = 10;

/// Number of documents of `info` that are not deleted.
pub(super) fn live_docs(
    segment: &SegmentReader,
    inverted: &InvertedIndexReader,
    info: &TermInfo,
) -> io::Result<u64> {
    if !segment.has_deletes() {
        return Ok(u64::from(info.doc_freq));
    }
    let mut postings = inverted.read_postings_from_terminfo(info, IndexRecordOption::Basic)?;
    let mut count = 0;
    let mut doc = postings.doc();
    while doc != TERMINATED {
        if !segment.is_deleted(doc) {
            count += 1;
        }
        doc = postings.advance();
    }
    Ok(count)
}

/// Counts, for each term of `field` matching `include`, the matched documents containing it.
///
/// Buckets are ordered by count, then key; at most [`TERMS_SIZE`] are returned.
pub(super) fn terms_buckets(
    searcher: &Searcher,
    field: Field,
    include: &Regex,
    matched: &[DocAddress],
) -> Result<Vec<Bucket>, BackendError> {
    let mut by_segment: BTreeMap<u32, BTreeSet<DocId>> = BTreeMap::new();
    for address in matched {
        by_segment
            .entry(address.segment_ord)
            .or_default()
            .insert(address.doc_id);
    }

    let mut counts: BTreeMap<String, u64> = BTreeMap::new();
    for (segment_ord, docs) in &by_segment {
        let segment = searcher.segment_reader(*segment_ord);
        let inverted = segment.inverted_index(field)?;
        let mut stream = inverted.terms().stream()?;
        while stream.advance() {
            let Ok(key) = str::from_utf8(stream.key()) else {
                continue;
            };
            if !include.is_match(key) {
                continue;
            }
            let mut postings =
                inverted.read_postings_from_terminfo(stream.value(), IndexRecordOption::Basic)?;
            let mut count = 0;
            let mut doc = postings.doc();
            while doc != TERMINATED {
                if docs.contains(&doc) {
                    count += 1;
                }
                doc = postings.advance();
            }
            if count > 0 {
                *counts.entry(key.to_string()).or_default() += count;
            }
        }
    }

    let mut buckets: Vec<Bucket> = counts
        .into_iter()
        .map(|(key, doc_count)| Bucket { key, doc_count })
        .collect();
    buckets.sort_by(|a, b| b.doc_count.cmp(&a.doc_count).then(a.key.cmp(&b.key)));
    buckets.truncate(TERMS_SIZE);
    Ok(buckets)
}

#[cfg(test)]
mod test {
    use tantivy::{
        Index, IndexWriter, TantivyDocument, Term,
        collector::DocSetCollector,
        query::AllQuery,
        schema::{STRING, Schema},
    };

    use super::*;

    fn index(values: &[&[&str]]) -> (Index, IndexWriter, Field) {
        let mut builder = Schema::builder();
        let field = builder.add_text_field("tags", STRING);
        let index = Index::create_in_ram(builder.build());
        let mut writer: IndexWriter = index.writer_with_num_threads(1, 15_000_000).unwrap();
        for tags in values {
            let mut doc = TantivyDocument::new();
            for tag in *tags {
                doc.add_text(field, tag);
            }
            writer.add_document(doc).unwrap();
        }
        writer.commit().unwrap();
        (index, writer, field)
    }

    fn buckets(index: &Index, field: Field, include: &str) -> Vec<(String, u64)> {
        let searcher = index.reader().unwrap().searcher();
        let matched: Vec<DocAddress> = searcher
            .search(&AllQuery, &DocSetCollector)
            .unwrap()
            .into_iter()
            .collect();
        let include = Regex::new(include).unwrap();
        terms_buckets(&searcher, field, &include, &matched)
            .unwrap()
            .into_iter()
            .map(|b| (b.key, b.doc_count))
            .collect()
    }

    #[test]
    fn buckets_are_ordered_by_count_then_key() {
        let (index, _writer, field) =
            index(&[&["acme", "acme cloud"], &["acme", "acme events"], &["other"]]);
        assert_eq!(buckets(&index, field, "^(?:acme.*)$"), vec![
            ("acme".to_string(), 2),
            ("acme cloud".to_string(), 1),
            ("acme events".to_string(), 1),
        ]);
    }

    #[test]
    fn deleted_documents_are_not_counted() {
        let (index, mut writer, field) = index(&[&["acme"], &["acme", "gone"]]);
        writer.delete_term(Term::from_field_text(field, "gone"));
        writer.commit().unwrap();

        let searcher = index.reader().unwrap().searcher();
        let segment = &searcher.segment_readers()[0];
        let inverted = segment.inverted_index(field).unwrap();
        let info = inverted.terms().get("acme").unwrap().unwrap();
        assert_eq!(live_docs(segment, &inverted, &info).unwrap(), 1);
        assert_eq!(buckets(&index, field, "^(?:.*)$"), vec![("acme".to_string(), 1)]);
    }

    #[test]
    fn at_most_ten_buckets() {
        let tags: Vec<String> = (0..12).map(|i| format!("tag{i:02}")).collect();
        let refs: Vec<&str> = tags.iter().map(String::as_str).collect();
        let (index, _writer, field) = index(&[&refs]);
        assert_eq!(buckets(&index, field, "^(?:tag.*)$").len(), TERMS_SIZE);
    }
}
