use std::collections::{BTreeMap, HashMap};
use std::ops::{Deref, Index};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, MatcherResult};
use crate::grammars::raw::{RawCapture, RawGrammar, RawRule};
use crate::grammars::regex::Regex;
use crate::matcher::has_backreferences;

/// Handle of a node in a [`SyntaxTree`].
///
/// Nodes are compared by handle, never by content: two identical rules added twice are two
/// different nodes and get separate cache entries.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u32);

impl NodeId {
    #[inline]
    pub fn as_index(self) -> usize {
        self.0 as usize
    }
}

impl Deref for NodeId {
    type Target = u32;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Capture group index -> scope name
pub type Captures = BTreeMap<usize, String>;

/// A rule subtree applied wherever `selector` weighs positively against the current scope
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Injection {
    pub selector: String,
    pub target: NodeId,
}

/// What a node contributes when it is a candidate of its parent
#[derive(Debug, Clone, Copy)]
pub enum RuleKind<'a> {
    Match(&'a Regex),
    /// Opens a region. Its end is looked for by the host, not by the search.
    Begin(&'a Regex),
    /// Only an end pattern: never a candidate on its own
    End,
    /// No pattern at all, its children are the candidates
    Group,
}

/// A rule of a grammar.
///
/// A node with neither `match`, `begin` nor `end` only groups its children.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleNode {
    pub name: Option<String>,
    pub content_name: Option<String>,
    pub match_pattern: Option<Regex>,
    pub begin_pattern: Option<Regex>,
    /// Kept as source: it can contain backreferences to the begin captures
    pub end_source: Option<String>,
    pub captures: Captures,
    pub begin_captures: Captures,
    pub end_captures: Captures,
    pub children: Vec<NodeId>,
    pub injections: Vec<Injection>,
}

impl RuleNode {
    pub fn group(children: impl IntoIterator<Item = NodeId>) -> Self {
        Self {
            children: children.into_iter().collect(),
            ..Default::default()
        }
    }

    pub fn matching(pattern: impl Into<String>) -> Self {
        Self {
            match_pattern: Some(Regex::new(pattern)),
            ..Default::default()
        }
    }

    pub fn begin_end(begin: impl Into<String>, end: impl Into<String>) -> Self {
        Self {
            begin_pattern: Some(Regex::new(begin)),
            end_source: Some(end.into()),
            ..Default::default()
        }
    }

    pub fn end_only(end: impl Into<String>) -> Self {
        Self {
            end_source: Some(end.into()),
            ..Default::default()
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_captures(mut self, captures: Captures) -> Self {
        self.captures = captures;
        self
    }

    pub fn with_begin_captures(mut self, captures: Captures) -> Self {
        self.begin_captures = captures;
        self
    }

    pub fn with_children(mut self, children: impl IntoIterator<Item = NodeId>) -> Self {
        self.children.extend(children);
        self
    }

    pub fn with_injection(mut self, selector: impl Into<String>, target: NodeId) -> Self {
        self.injections.push(Injection {
            selector: selector.into(),
            target,
        });
        self
    }

    pub fn kind(&self) -> RuleKind<'_> {
        if let Some(re) = &self.match_pattern {
            RuleKind::Match(re)
        } else if let Some(re) = &self.begin_pattern {
            RuleKind::Begin(re)
        } else if self.end_source.is_some() {
            RuleKind::End
        } else {
            RuleKind::Group
        }
    }

    #[inline]
    pub fn has_begin(&self) -> bool {
        self.begin_pattern.is_some()
    }

    pub fn end_has_backreferences(&self) -> bool {
        self.end_source.as_deref().is_some_and(has_backreferences)
    }
}

/// The rules of every loaded grammar, addressed by [`NodeId`].
///
/// Read-only once built: the engine shares it between threads.
#[derive(Debug, Clone, Default)]
pub struct SyntaxTree {
    nodes: Vec<RuleNode>,
    roots: HashMap<String, NodeId>,
    // grouping nodes whose search can merge an injection, see `may_raise_priority`
    raises_priority: Vec<bool>,
}

impl SyntaxTree {
    pub fn get(&self, id: NodeId) -> Option<&RuleNode> {
        self.nodes.get(id.as_index())
    }

    /// The root node of the grammar with the given scope name
    pub fn root(&self, scope_name: &str) -> Option<NodeId> {
        self.roots.get(scope_name).copied()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Whether searching `id` as a grouping child can return a state with another priority
    /// than the one it was searched with.
    ///
    /// Only grouping nodes that have injections, or that reach one through grouping
    /// children, can.
    pub fn may_raise_priority(&self, id: NodeId) -> bool {
        self.raises_priority
            .get(id.as_index())
            .copied()
            .unwrap_or(false)
    }
}

/// Marks the grouping nodes whose search merges injections, their own or those of grouping
/// descendants. Includes can make cycles so this iterates until nothing changes.
fn groups_reaching_injections(nodes: &[RuleNode]) -> Vec<bool> {
    let is_group = |node: &RuleNode| matches!(node.kind(), RuleKind::Group);
    let mut flags: Vec<bool> = nodes
        .iter()
        .map(|node| is_group(node) && !node.injections.is_empty())
        .collect();

    let mut changed = true;
    while changed {
        changed = false;
        for (i, node) in nodes.iter().enumerate() {
            if flags[i] || !is_group(node) {
                continue;
            }
            if node
                .children
                .iter()
                .any(|child| flags.get(child.as_index()).copied().unwrap_or(false))
            {
                flags[i] = true;
                changed = true;
            }
        }
    }
    flags
}

impl Index<NodeId> for SyntaxTree {
    type Output = RuleNode;

    /// # Panics
    ///
    /// Panics if `id` doesn't belong to this tree. Use [`SyntaxTree::get`] for handles that
    /// might come from elsewhere.
    fn index(&self, id: NodeId) -> &Self::Output {
        &self.nodes[id.as_index()]
    }
}

type Repository = HashMap<String, NodeId>;

/// Builds a [`SyntaxTree`], either node by node or from TextMate JSON grammars.
#[derive(Debug, Default)]
pub struct SyntaxTreeBuilder {
    nodes: Vec<RuleNode>,
    roots: HashMap<String, NodeId>,
    // top level repository of each grammar, for `scope#name` includes
    repositories: HashMap<String, Repository>,
    // `injectTo` targets that were not loaded yet
    pending_injections: Vec<(String, Injection)>,
}

impl SyntaxTreeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, node: RuleNode) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    pub fn node_mut(&mut self, id: NodeId) -> MatcherResult<&mut RuleNode> {
        self.nodes
            .get_mut(id.as_index())
            .ok_or(Error::UnknownNode(id))
    }

    /// Appends a child after the node was added, eg to build recursive rules
    pub fn push_child(&mut self, parent: NodeId, child: NodeId) -> MatcherResult<()> {
        self.node_mut(parent)?.children.push(child);
        Ok(())
    }

    pub fn add_injection(
        &mut self,
        node: NodeId,
        selector: impl Into<String>,
        target: NodeId,
    ) -> MatcherResult<()> {
        self.node_mut(node)?.injections.push(Injection {
            selector: selector.into(),
            target,
        });
        Ok(())
    }

    pub fn add_grammar_from_path(&mut self, path: impl AsRef<Path>) -> MatcherResult<NodeId> {
        let raw = RawGrammar::load_from_file(path)?;
        self.add_grammar(raw)
    }

    pub fn add_grammar_from_json(&mut self, json: &str) -> MatcherResult<NodeId> {
        let raw = RawGrammar::from_json(json)?;
        self.add_grammar(raw)
    }

    /// Compiles a grammar into the tree and returns its root.
    ///
    /// Includes of other grammars only resolve against grammars added before this one.
    /// On error the builder is left as it was before the call.
    pub fn add_grammar(&mut self, raw: RawGrammar) -> MatcherResult<NodeId> {
        let RawGrammar {
            scope_name,
            patterns,
            repository,
            injections,
            injection_selector,
            inject_to,
            ..
        } = raw;

        let start = self.nodes.len();
        let root = self.reserve();
        let compiled = self.compile_grammar(root, &scope_name, repository, patterns, injections);
        let (children, injections, top_repository) = match compiled {
            Ok(compiled) => compiled,
            Err(err) => {
                self.nodes.truncate(start);
                return Err(err);
            }
        };

        self.roots.insert(scope_name.clone(), root);
        self.repositories.insert(scope_name.clone(), top_repository);
        self.nodes[root.as_index()] = RuleNode {
            name: Some(scope_name.clone()),
            children,
            injections,
            ..Default::default()
        };

        if let Some(selector) = injection_selector {
            for target in inject_to {
                let injection = Injection {
                    selector: selector.clone(),
                    target: root,
                };
                match self.roots.get(&target) {
                    Some(&target_root) => self.nodes[target_root.as_index()]
                        .injections
                        .push(injection),
                    None => self.pending_injections.push((target, injection)),
                }
            }
        }

        let (ready, pending): (Vec<_>, Vec<_>) = std::mem::take(&mut self.pending_injections)
            .into_iter()
            .partition(|(target, _)| *target == scope_name);
        self.pending_injections = pending;
        for (_, injection) in ready {
            self.nodes[root.as_index()].injections.push(injection);
        }

        Ok(root)
    }

    fn compile_grammar(
        &mut self,
        root: NodeId,
        scope_name: &str,
        repository: HashMap<String, RawRule>,
        patterns: Vec<RawRule>,
        injections: BTreeMap<String, RawRule>,
    ) -> MatcherResult<(Vec<NodeId>, Vec<Injection>, Repository)> {
        let mut compiler = GrammarCompiler {
            builder: self,
            scope_name,
            root,
            repositories: Vec::new(),
        };
        compiler.push_repository(repository)?;
        let children = compiler.compile_patterns(patterns)?;
        let mut compiled_injections = Vec::new();
        for (selector, rule) in injections {
            let target = compiler.compile_rule(rule)?;
            compiled_injections.push(Injection { selector, target });
        }
        let top_repository = compiler.repositories.pop().unwrap_or_default();
        Ok((children, compiled_injections, top_repository))
    }

    pub fn build(self) -> SyntaxTree {
        let raises_priority = groups_reaching_injections(&self.nodes);
        SyntaxTree {
            nodes: self.nodes,
            roots: self.roots,
            raises_priority,
        }
    }

    // Push a no-op to reserve the spot of a rule we compile later
    fn reserve(&mut self) -> NodeId {
        self.add_node(RuleNode::default())
    }
}

struct GrammarCompiler<'b> {
    builder: &'b mut SyntaxTreeBuilder,
    scope_name: &'b str,
    root: NodeId,
    repositories: Vec<Repository>,
}

impl GrammarCompiler<'_> {
    fn compile_patterns(&mut self, rules: Vec<RawRule>) -> MatcherResult<Vec<NodeId>> {
        rules.into_iter().map(|r| self.compile_rule(r)).collect()
    }

    fn compile_rule(&mut self, raw: RawRule) -> MatcherResult<NodeId> {
        // vscode ignores other rule contents if there's an include
        // https://github.com/microsoft/vscode-textmate/blob/f03a6a8790af81372d0e81facae75554ec5e97ef/src/rule.ts#L495
        if let Some(include) = &raw.include {
            return self.resolve_include(include);
        }
        let id = self.builder.reserve();
        self.compile_into(id, raw)?;
        Ok(id)
    }

    fn compile_into(&mut self, id: NodeId, raw: RawRule) -> MatcherResult<()> {
        let node = if let Some(include) = &raw.include {
            // only happens for repository entries, which need a node of their own
            RuleNode::group([self.resolve_include(include)?])
        } else {
            let has_repository = !raw.repository.is_empty();
            if has_repository {
                self.push_repository(raw.repository)?;
            }
            let children = self.compile_patterns(raw.patterns);
            if has_repository {
                self.repositories.pop();
            }

            let begin_captures = if raw.begin_captures.is_empty() {
                &raw.captures
            } else {
                &raw.begin_captures
            };
            let end_captures = if raw.end_captures.is_empty() {
                &raw.captures
            } else {
                &raw.end_captures
            };
            RuleNode {
                begin_captures: compile_captures(begin_captures),
                end_captures: compile_captures(end_captures),
                captures: compile_captures(&raw.captures),
                name: raw.name,
                content_name: raw.content_name,
                match_pattern: raw.match_.map(Regex::new),
                begin_pattern: raw.begin.map(Regex::new),
                end_source: raw.end,
                children: children?,
                injections: Vec::new(),
            }
        };

        self.builder.nodes[id.as_index()] = node;
        Ok(())
    }

    /// Every entry gets its id before any is compiled so entries can include each other
    fn push_repository(&mut self, raw: HashMap<String, RawRule>) -> MatcherResult<()> {
        let entries: Vec<(String, NodeId, RawRule)> = raw
            .into_iter()
            .map(|(name, rule)| (name, self.builder.reserve(), rule))
            .collect();
        self.repositories.push(
            entries
                .iter()
                .map(|(name, id, _)| (name.clone(), *id))
                .collect(),
        );

        for (_, id, rule) in entries {
            self.compile_into(id, rule)?;
        }
        Ok(())
    }

    fn resolve_include(&self, include: &str) -> MatcherResult<NodeId> {
        let found = match include {
            // we don't know at build time which grammar embeds this one so
            // `$base` is this grammar's root as well
            "$self" | "$base" => Some(self.root),
            local if local.starts_with('#') => self
                .repositories
                .iter()
                .rev()
                .find_map(|repo| repo.get(&local[1..]))
                .copied(),
            other => match other.split_once('#') {
                Some((scope, name)) if scope == self.scope_name => self
                    .repositories
                    .first()
                    .and_then(|repo| repo.get(name))
                    .copied(),
                Some((scope, name)) => self
                    .builder
                    .repositories
                    .get(scope)
                    .and_then(|repo| repo.get(name))
                    .copied(),
                None if other == self.scope_name => Some(self.root),
                None => self.builder.roots.get(other).copied(),
            },
        };

        found.ok_or_else(|| Error::UnresolvedInclude(include.to_owned()))
    }
}

fn compile_captures(raw: &BTreeMap<String, RawCapture>) -> Captures {
    raw.iter()
        .filter_map(|(key, capture)| {
            let index = key.parse::<usize>().ok()?;
            let name = capture.name.clone()?;
            Some((index, name))
        })
        .collect()
}
