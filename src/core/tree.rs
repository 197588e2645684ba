/// Arena storage for a question forest.
///
/// Questions live in a flat vector; each node records its parent and the
/// ordered ids of its children, so parent lookups are a table read rather
/// than a forest scan. Document order is the pre-order walk of `roots`.
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rustc_hash::{FxHashMap, FxHashSet};
use thiserror::Error;

use crate::core::rule::Rule;
use crate::schema::question::Question;
use crate::schema::sequence::QuestionsSequence;

#[derive(Debug, Error)]
pub enum TreeError {
    #[error("duplicate question id: {0}")]
    DuplicateId(String),
    #[error("unknown question id: {0}")]
    UnknownQuestion(String),
}

pub type NodeId = usize;

/// A question plus its position in the arena. `question.children` is
/// always empty here; `children` holds the structure.
#[derive(Debug, Clone)]
pub struct QuestionNode {
    pub question: Question,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
}

#[derive(Debug, Clone, Default)]
pub struct QuestionTree {
    nodes: Vec<QuestionNode>,
    index: FxHashMap<String, NodeId>,
    roots: Vec<NodeId>,
}

impl QuestionTree {
    pub fn from_sequence(sequence: QuestionsSequence) -> Result<QuestionTree, TreeError> {
        let mut tree = QuestionTree::default();
        for question in sequence.questions {
            let id = tree.insert(question, None)?;
            tree.roots.push(id);
        }
        Ok(tree)
    }

    fn insert(&mut self, mut question: Question, parent: Option<NodeId>) -> Result<NodeId, TreeError> {
        if self.index.contains_key(&question.id) {
            return Err(TreeError::DuplicateId(question.id));
        }
        let children = std::mem::take(&mut question.children);
        let node_id = self.nodes.len();
        self.index.insert(question.id.clone(), node_id);
        self.nodes.push(QuestionNode {
            question,
            parent,
            children: Vec::with_capacity(children.len()),
        });

        for child in children {
            let child_id = self.insert(child, Some(node_id))?;
            self.nodes[node_id].children.push(child_id);
        }
        Ok(node_id)
    }

    /// Live questions; slots of removed sub-trees are not counted.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn contains(&self, question_id: &str) -> bool {
        self.index.contains_key(question_id)
    }

    pub fn node(&self, id: NodeId) -> &QuestionNode {
        &self.nodes[id]
    }

    pub fn node_id(&self, question_id: &str) -> Option<NodeId> {
        self.index.get(question_id).copied()
    }

    pub fn root_ids(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn roots(&self) -> impl Iterator<Item = &Question> + '_ {
        self.roots.iter().map(|&id| &self.nodes[id].question)
    }

    pub fn get(&self, question_id: &str) -> Option<&Question> {
        self.node_id(question_id).map(|id| &self.nodes[id].question)
    }

    pub fn parent(&self, question_id: &str) -> Option<&Question> {
        let node = &self.nodes[self.node_id(question_id)?];
        node.parent.map(|p| &self.nodes[p].question)
    }

    pub fn children(&self, question_id: &str) -> Vec<&Question> {
        match self.node_id(question_id) {
            Some(id) => self.nodes[id]
                .children
                .iter()
                .map(|&c| &self.nodes[c].question)
                .collect(),
            None => Vec::new(),
        }
    }

    /// Node ids in document order (each question before its children).
    pub fn document_order(&self) -> Vec<NodeId> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack: Vec<NodeId> = self.roots.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            order.push(id);
            stack.extend(self.nodes[id].children.iter().rev());
        }
        order
    }

    /// Rebuild the nested question for `question_id`, runtime children included.
    pub fn subtree(&self, question_id: &str) -> Option<Question> {
        self.node_id(question_id).map(|id| self.rebuild(id))
    }

    fn rebuild(&self, id: NodeId) -> Question {
        let node = &self.nodes[id];
        let mut question = node.question.clone();
        question.children = node.children.iter().map(|&c| self.rebuild(c)).collect();
        question
    }

    /// Export the forest, spliced sub-trees included.
    pub fn to_sequence(&self) -> QuestionsSequence {
        QuestionsSequence::new(self.roots.iter().map(|&id| self.rebuild(id)).collect())
    }

    /// Attach `question` (with its sub-tree) as the last child of `parent_id`.
    /// Nothing is inserted if any id of the sub-tree is already taken.
    pub fn splice(&mut self, parent_id: &str, question: Question) -> Result<NodeId, TreeError> {
        let parent = self
            .node_id(parent_id)
            .ok_or_else(|| TreeError::UnknownQuestion(parent_id.to_string()))?;

        {
            let mut seen = FxHashSet::default();
            let mut pending = vec![&question];
            while let Some(q) = pending.pop() {
                if self.contains(&q.id) || !seen.insert(q.id.as_str()) {
                    return Err(TreeError::DuplicateId(q.id.clone()));
                }
                pending.extend(q.children.iter());
            }
        }

        let child = self.insert(question, Some(parent))?;
        self.nodes[parent].children.push(child);
        tracing::debug!(parent = parent_id, child = %self.nodes[child].question.id, "spliced sub-tree");
        Ok(child)
    }

    /// Detach `question_id` and its sub-tree. Returns the removed ids, the
    /// detached question first. Arena slots stay allocated but unreachable.
    pub fn remove(&mut self, question_id: &str) -> Result<Vec<String>, TreeError> {
        let id = self
            .node_id(question_id)
            .ok_or_else(|| TreeError::UnknownQuestion(question_id.to_string()))?;
        match self.nodes[id].parent {
            Some(parent) => self.nodes[parent].children.retain(|&c| c != id),
            None => self.roots.retain(|&r| r != id),
        }

        let mut removed = Vec::new();
        let mut pending = vec![id];
        while let Some(n) = pending.pop() {
            let node = &self.nodes[n];
            self.index.remove(&node.question.id);
            removed.push(node.question.id.clone());
            pending.extend(node.children.iter().rev());
        }
        tracing::debug!(question = question_id, removed = removed.len(), "removed sub-tree");
        Ok(removed)
    }

    /// Deep copy of `source` with fresh ids for every question in it.
    /// `isSelected` references between questions of the copy follow the
    /// new ids; everything else is copied verbatim.
    pub fn reusable_copy(&self, source: &Question, minter: &mut IdMinter) -> Question {
        let mut ids: FxHashMap<String, String> = FxHashMap::default();
        let mut pending = vec![source];
        while let Some(q) = pending.pop() {
            let fresh = minter.mint(&q.id, |candidate| {
                self.contains(candidate) || ids.values().any(|v| v == candidate)
            });
            ids.insert(q.id.clone(), fresh);
            pending.extend(q.children.iter());
        }
        relabel(source, &ids)
    }
}

fn relabel(question: &Question, ids: &FxHashMap<String, String>) -> Question {
    let mut copy = question.clone();
    if let Some(fresh) = ids.get(&question.id) {
        copy.id = fresh.clone();
    }
    if let Ok(rule) = Rule::parse(&question.rule) {
        if rule.references().iter().any(|(q, _)| ids.contains_key(*q)) {
            copy.rule = rule.renamed(ids);
        }
    }
    copy.children = question.children.iter().map(|c| relabel(c, ids)).collect();
    copy
}

/// Seeded source of fresh question ids of the form `<stem>~<6 hex digits>`.
#[derive(Debug, Clone)]
pub struct IdMinter {
    rng: StdRng,
}

impl IdMinter {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// A fresh id derived from `base` for which `taken` is false. Any
    /// suffix from an earlier copy is dropped first, so ids do not grow.
    pub fn mint(&mut self, base: &str, taken: impl Fn(&str) -> bool) -> String {
        let stem = base.split('~').next().unwrap_or(base);
        loop {
            let candidate = format!("{}~{:06x}", stem, self.rng.gen::<u32>() & 0x00ff_ffff);
            if !taken(&candidate) {
                return candidate;
            }
        }
    }
}
