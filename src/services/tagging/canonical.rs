//! Corpus-wide tag canonicalization.
//!
//! Builds a mapping from every tag variant in the corpus to one canonical
//! label. An optional LLM clustering pass proposes groups first; a
//! deterministic token-overlap merge always runs on top of it, so the
//! result is well-formed with or without a model.
//!
//! # Merge rule
//!
//! Two labels merge when their meaningful-token sets (see
//! [`meaningful_tokens`]) share at least one anchor token (three characters
//! or longer, or a configured special short token) and the shared tokens
//! cover at least half of the smaller set. Merging is transitive; each
//! group is represented by its shortest label, ties broken
//! lexicographically.

use super::{LlmTagClusterer, Vocabulary, format_label, meaningful_tokens, normalize_key};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

/// Minimum length of a shared token that can anchor a merge.
const MIN_ANCHOR_LEN: usize = 3;

/// Minimum fraction of the smaller token set the overlap must cover.
const MIN_COVERAGE: f64 = 0.5;

/// Disjoint-set forest over label indices.
#[derive(Debug, Clone)]
pub struct UnionFind {
    parent: Vec<usize>,
    rank: Vec<usize>,
}

impl UnionFind {
    /// Creates `size` singleton sets.
    #[must_use]
    pub fn new(size: usize) -> Self {
        Self {
            parent: (0..size).collect(),
            rank: vec![0; size],
        }
    }

    /// Returns the root of `x`, compressing the path behind it.
    pub fn find(&mut self, x: usize) -> usize {
        let mut root = x;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        let mut node = x;
        while self.parent[node] != root {
            let next = self.parent[node];
            self.parent[node] = root;
            node = next;
        }
        root
    }

    /// Merges the sets containing `a` and `b`. Returns false if they were
    /// already joined.
    pub fn union(&mut self, a: usize, b: usize) -> bool {
        let root_a = self.find(a);
        let root_b = self.find(b);
        if root_a == root_b {
            return false;
        }
        match self.rank[root_a].cmp(&self.rank[root_b]) {
            std::cmp::Ordering::Less => self.parent[root_a] = root_b,
            std::cmp::Ordering::Greater => self.parent[root_b] = root_a,
            std::cmp::Ordering::Equal => {
                self.parent[root_b] = root_a;
                self.rank[root_a] += 1;
            },
        }
        true
    }
}

/// Mapping from normalized tag keys to canonical labels.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CanonicalMap {
    /// Normalized key to canonical label.
    canonical: BTreeMap<String, String>,
    /// Normalized key to the label chosen for that key.
    labels: BTreeMap<String, String>,
}

impl CanonicalMap {
    /// Returns the canonical label for `tag`, if the tag was in the corpus.
    #[must_use]
    pub fn get(&self, tag: &str) -> Option<&str> {
        self.canonical.get(&normalize_key(tag)).map(String::as_str)
    }

    /// Returns the canonical label for `tag`, or the formatted tag itself
    /// when it was not in the corpus.
    #[must_use]
    pub fn resolve(&self, tag: &str) -> String {
        self.get(tag)
            .map_or_else(|| format_label(tag), str::to_string)
    }

    /// Maps a tag list to canonical labels, dropping blanks and duplicates
    /// (compared by normalized key, first occurrence wins).
    #[must_use]
    pub fn canonicalize_tags<S: AsRef<str>>(&self, tags: &[S]) -> Vec<String> {
        let mut seen = BTreeSet::new();
        tags.iter()
            .map(|tag| self.resolve(tag.as_ref()))
            .filter(|label| !label.is_empty() && seen.insert(dedupe_key(label)))
            .collect()
    }

    /// Returns every corpus label that maps to `canonical`, other than
    /// `canonical` itself, sorted.
    #[must_use]
    pub fn aliases_of(&self, canonical: &str) -> Vec<String> {
        let target = normalize_key(canonical);
        let aliases: BTreeSet<&str> = self
            .canonical
            .iter()
            .filter(|(_, c)| normalize_key(c) == target)
            .filter_map(|(key, _)| self.labels.get(key))
            .filter(|label| normalize_key(label) != target)
            .map(String::as_str)
            .collect();
        aliases.into_iter().map(str::to_string).collect()
    }

    /// Returns the distinct canonical labels.
    #[must_use]
    pub fn canonical_labels(&self) -> BTreeSet<&str> {
        self.canonical.values().map(String::as_str).collect()
    }

    /// Iterates `(normalized key, canonical label)` pairs in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.canonical
            .iter()
            .map(|(key, canonical)| (key.as_str(), canonical.as_str()))
    }

    /// Number of keys in the map.
    #[must_use]
    pub fn len(&self) -> usize {
        self.canonical.len()
    }

    /// Returns true if the map is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.canonical.is_empty()
    }
}

/// Key used to deduplicate labels; falls back to the lowercased label when
/// it has no ASCII alphanumerics.
#[must_use]
pub fn dedupe_key(label: &str) -> String {
    let key = normalize_key(label);
    if key.is_empty() {
        label.trim().to_lowercase()
    } else {
        key
    }
}

/// Builds canonical maps over a tag corpus.
pub struct TagCanonicalizer {
    vocabulary: Arc<Vocabulary>,
    clusterer: Option<LlmTagClusterer>,
}

impl Default for TagCanonicalizer {
    fn default() -> Self {
        Self::new(Arc::new(Vocabulary::default()))
    }
}

impl TagCanonicalizer {
    /// Creates a canonicalizer without LLM clustering.
    #[must_use]
    pub const fn new(vocabulary: Arc<Vocabulary>) -> Self {
        Self {
            vocabulary,
            clusterer: None,
        }
    }

    /// Enables the LLM clustering pass.
    #[must_use]
    pub fn with_clusterer(mut self, clusterer: LlmTagClusterer) -> Self {
        self.clusterer = Some(clusterer);
        self
    }

    /// Builds the canonical map for every tag in `tags`.
    ///
    /// The result does not depend on input order or multiplicity. Tags
    /// without ASCII alphanumerics have no key and are left out; use
    /// [`CanonicalMap::resolve`] for them.
    #[must_use]
    #[tracing::instrument(name = "memoria.canonicalize", skip_all, fields(tags = tags.len()))]
    pub fn build_canonical_map<S: AsRef<str>>(&self, tags: &[S]) -> CanonicalMap {
        let labels = preferred_labels(tags.iter().map(AsRef::as_ref));
        if labels.is_empty() {
            return CanonicalMap::default();
        }

        let proposed = self.proposed_canonicals(&labels);

        // Seeds for the deterministic pass: one label per distinct proposed key.
        let seeds = preferred_labels(proposed.values().map(String::as_str));
        let seed_labels: Vec<&str> = seeds.values().map(String::as_str).collect();
        let merged = self.merge_labels(&seed_labels);

        let canonical = proposed
            .iter()
            .map(|(key, proposal)| {
                let seed = seeds
                    .get(&normalize_key(proposal))
                    .map_or(proposal.as_str(), String::as_str);
                let target = merged.get(seed).map_or(seed, String::as_str);
                (key.clone(), target.to_string())
            })
            .collect();

        tracing::debug!(
            tags = labels.len(),
            canonical = seeds.len(),
            "Built canonical tag map"
        );

        CanonicalMap { canonical, labels }
    }

    /// Returns key to proposed canonical label, from the LLM when available.
    fn proposed_canonicals(&self, labels: &BTreeMap<String, String>) -> BTreeMap<String, String> {
        let clusters = self.clusterer.as_ref().and_then(|clusterer| {
            let inputs: Vec<String> = labels.values().cloned().collect();
            match clusterer.cluster(&inputs) {
                Ok(clusters) => {
                    metrics::counter!("tag_clustering_llm_total", "status" => "success")
                        .increment(1);
                    Some(clusters)
                },
                Err(e) => {
                    metrics::counter!("tag_clustering_llm_total", "status" => "error")
                        .increment(1);
                    tracing::warn!(error = %e, "LLM tag clustering failed, using local merge only");
                    None
                },
            }
        });

        labels
            .iter()
            .map(|(key, label)| {
                let proposal = clusters
                    .as_ref()
                    .and_then(|c| c.get(key))
                    .filter(|p| !normalize_key(p).is_empty())
                    .unwrap_or(label);
                (key.clone(), proposal.clone())
            })
            .collect()
    }

    /// Runs the deterministic overlap merge over distinct labels.
    ///
    /// Returns each label mapped to its group representative.
    #[must_use]
    pub fn merge_labels(&self, labels: &[&str]) -> HashMap<String, String> {
        let tokens: Vec<BTreeSet<String>> = labels
            .iter()
            .map(|label| meaningful_tokens(label, &self.vocabulary))
            .collect();

        let mut groups = UnionFind::new(labels.len());
        for i in 0..labels.len() {
            for j in (i + 1)..labels.len() {
                if self.should_merge(&tokens[i], &tokens[j]) {
                    groups.union(i, j);
                }
            }
        }

        let mut representative: HashMap<usize, usize> = HashMap::new();
        for (i, label) in labels.iter().enumerate() {
            let root = groups.find(i);
            representative
                .entry(root)
                .and_modify(|best| {
                    if prefer_label(label, labels[*best]) {
                        *best = i;
                    }
                })
                .or_insert(i);
        }

        labels
            .iter()
            .enumerate()
            .map(|(i, label)| {
                let root = groups.find(i);
                let best = representative.get(&root).copied().unwrap_or(i);
                ((*label).to_string(), labels[best].to_string())
            })
            .collect()
    }

    /// Returns true if two meaningful-token sets should join one group.
    #[allow(clippy::cast_precision_loss)]
    fn should_merge(&self, a: &BTreeSet<String>, b: &BTreeSet<String>) -> bool {
        if a.is_empty() || b.is_empty() {
            return false;
        }
        let shared: Vec<&String> = a.intersection(b).collect();
        if shared.is_empty() {
            return false;
        }
        let anchored = shared.iter().any(|token| {
            token.chars().count() >= MIN_ANCHOR_LEN || self.vocabulary.is_special_short(token)
        });
        if !anchored {
            return false;
        }
        let smaller = a.len().min(b.len()) as f64;
        shared.len() as f64 / smaller >= MIN_COVERAGE
    }
}

/// Returns true if `candidate` should represent a group over `current`.
fn prefer_label(candidate: &str, current: &str) -> bool {
    (candidate.chars().count(), candidate) < (current.chars().count(), current)
}

/// Collapses labels sharing a normalized key to one preferred, formatted
/// label per key.
fn preferred_labels<'a>(tags: impl Iterator<Item = &'a str>) -> BTreeMap<String, String> {
    let mut labels: BTreeMap<String, String> = BTreeMap::new();
    for tag in tags {
        let key = normalize_key(tag);
        if key.is_empty() {
            continue;
        }
        let label = format_label(tag);
        labels
            .entry(key)
            .and_modify(|current| {
                if prefer_label(&label, current) {
                    current.clone_from(&label);
                }
            })
            .or_insert(label);
    }
    labels
}
