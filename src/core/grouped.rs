/// Grouped-option aggregation: composite answers with a qualifier per item.
///
/// A grouped question's top-level options are *roots* (e.g. "Leg"). Each
/// root has items (`children`, e.g. "Left", "Right") and qualifiers
/// (`options`, e.g. "Swollen", "Normal"). The aggregator records one
/// qualifier per item and composes them into a single narrative.
///
/// Qualifier groups are emitted in first-selection order; items inside a
/// group keep the root's declared order.
use rustc_hash::{FxHashMap, FxHashSet};

use crate::core::narrative::compound_join;
use crate::schema::irregular::IrregularForm;
use crate::schema::option::{AnswerOption, OptionKind};
use crate::schema::question::{GroupOrder, Question, QuestionKind};

#[derive(Debug, Clone)]
struct Slot {
    qualifier: AnswerOption,
    selected_at: u64,
}

/// Selection state for one grouped question, owned by the session that
/// is answering it.
#[derive(Debug, Clone)]
pub struct GroupedAggregator {
    question: Question,
    slots: FxHashMap<String, Slot>,
    clock: u64,
}

struct QualifierGroup<'a> {
    qualifier: &'a AnswerOption,
    items: Vec<&'a AnswerOption>,
    first_selected: u64,
}

impl GroupedAggregator {
    pub fn new(question: &Question) -> Self {
        Self {
            question: question.clone(),
            slots: FxHashMap::default(),
            clock: 0,
        }
    }

    pub fn question(&self) -> &Question {
        &self.question
    }

    /// The qualifier currently recorded for `item`.
    pub fn get_selected_option(&self, item: &AnswerOption) -> Option<&AnswerOption> {
        self.slots.get(&item.id).map(|s| &s.qualifier)
    }

    pub fn has_selected_options(&self) -> bool {
        !self.slots.is_empty()
    }

    /// The root option whose items include `item`.
    fn root_of(&self, item: &AnswerOption) -> Option<&AnswerOption> {
        self.question
            .options
            .iter()
            .find(|root| root.children().iter().any(|c| c.id == item.id))
    }

    /// Record `qualifier` for `item`.
    ///
    /// A "none" qualifier clears every other item of the same root first;
    /// any other qualifier evicts "none" picks from the root's items.
    pub fn option_selected(&mut self, item: &AnswerOption, qualifier: &AnswerOption) {
        let scope = self.root_of(item).map(|root| {
            let item_ids: Vec<String> = root.children().iter().map(|c| c.id.clone()).collect();
            let none_ids: FxHashSet<String> =
                none_qualifiers(root).into_iter().map(str::to_string).collect();
            (item_ids, none_ids)
        });

        match scope {
            Some((item_ids, none_ids)) => {
                for id in &item_ids {
                    let clear = qualifier.is_none()
                        || self
                            .slots
                            .get(id)
                            .is_some_and(|s| none_ids.contains(&s.qualifier.id));
                    if clear {
                        self.slots.remove(id);
                    }
                }
            }
            None => tracing::warn!(
                question = %self.question.id,
                option = %item.id,
                "selected item belongs to no grouped option"
            ),
        }

        self.clock += 1;
        self.slots.insert(
            item.id.clone(),
            Slot {
                qualifier: qualifier.clone(),
                selected_at: self.clock,
            },
        );
    }

    pub fn remove_selected_option(&mut self, item: &AnswerOption) {
        self.slots.remove(&item.id);
    }

    pub fn clear_answers(&mut self) {
        self.slots.clear();
    }

    fn groups<'a>(&'a self, root: &'a AnswerOption) -> Vec<QualifierGroup<'a>> {
        let mut groups: Vec<QualifierGroup<'a>> = Vec::new();
        for item in root.children() {
            let Some(slot) = self.slots.get(&item.id) else {
                continue;
            };
            match groups.iter_mut().find(|g| g.qualifier.id == slot.qualifier.id) {
                Some(group) => {
                    group.items.push(item);
                    group.first_selected = group.first_selected.min(slot.selected_at);
                }
                None => groups.push(QualifierGroup {
                    qualifier: &slot.qualifier,
                    items: vec![item],
                    first_selected: slot.selected_at,
                }),
            }
        }
        groups.sort_by_key(|g| g.first_selected);
        groups
    }

    /// Narrative for one grouped root, or an empty string when none of
    /// its items has a qualifier.
    pub fn narrative_for(&self, root: &AnswerOption) -> String {
        let OptionKind::Grouped {
            before_group,
            after_group,
            ..
        } = &root.kind
        else {
            tracing::warn!(
                question = %self.question.id,
                option = %root.id,
                "narrative requested for a non-grouped option"
            );
            return String::new();
        };

        let groups = self.groups(root);
        if groups.is_empty() {
            return String::new();
        }

        let (order, linking_verb) = match &self.question.kind {
            QuestionKind::Grouped {
                order,
                linking_verb,
            } => (*order, linking_verb.clone()),
            _ => (GroupOrder::default(), IrregularForm::default()),
        };

        let mut out = root.narrative.clone();
        for (i, group) in groups.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            out.push(' ');
            let overrides = matches!(group.qualifier.kind, OptionKind::GroupedOverride { .. })
                && !group.qualifier.narrative.is_empty();
            if overrides {
                out.push_str(&group.qualifier.narrative);
            } else {
                out.push_str(&compose(group, before_group, after_group, &linking_verb, order));
            }
        }
        out
    }

    /// Finish the question: one synthetic option, cloned from the
    /// question's first option, carrying the composed narrative.
    pub fn next_button_pressed(&self) -> Option<AnswerOption> {
        if !self.has_selected_options() {
            tracing::warn!(question = %self.question.id, "grouped question finished with nothing selected");
            return None;
        }

        let fragments: Vec<String> = self
            .question
            .options
            .iter()
            .filter(|o| matches!(o.kind, OptionKind::Grouped { .. }))
            .map(|root| self.narrative_for(root))
            .filter(|fragment| !fragment.trim().is_empty())
            .collect();

        let first = self.question.options.first()?;
        Some(first.with_narrative(fragments.join("; ").trim_start().to_string()))
    }
}

fn none_qualifiers(root: &AnswerOption) -> FxHashSet<&str> {
    let mut ids = FxHashSet::default();
    if let OptionKind::Grouped { options, .. } = &root.kind {
        ids.extend(options.iter().filter(|o| o.is_none()).map(|o| o.id.as_str()));
    }
    for item in root.children() {
        ids.extend(item.children().iter().filter(|o| o.is_none()).map(|o| o.id.as_str()));
    }
    ids
}

fn compose(
    group: &QualifierGroup<'_>,
    before_group: &IrregularForm,
    after_group: &IrregularForm,
    linking_verb: &IrregularForm,
    order: GroupOrder,
) -> String {
    let names: Vec<&str> = group.items.iter().map(|i| i.narrative.as_str()).collect();
    let list = compound_join(&names);
    let plural = group.items.len() > 1;
    let qualifier = group.qualifier.narrative.as_str();

    let parts = match order {
        GroupOrder::QuestionThenAnswer => [
            before_group.pick(plural),
            Some(list.as_str()),
            after_group.pick(plural),
            linking_verb.pick(plural),
            Some(qualifier),
        ],
        GroupOrder::AnswerThenQuestion => [
            before_group.pick(plural),
            Some(qualifier),
            linking_verb.pick(plural),
            Some(list.as_str()),
            after_group.pick(plural),
        ],
    };

    parts
        .into_iter()
        .flatten()
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::formatter::SentenceFormatter;

    fn leg_root() -> AnswerOption {
        AnswerOption::new(
            "leg",
            "",
            OptionKind::Grouped {
                title: "Leg".to_string(),
                before_group: IrregularForm::singular("the"),
                after_group: IrregularForm::new("leg", "legs"),
                children: vec![AnswerOption::text("left", "left"), AnswerOption::text("right", "right")],
                options: vec![
                    AnswerOption::text("swollen", "swollen"),
                    AnswerOption::text("red", "reddened"),
                    AnswerOption::none("normal", "normal"),
                ],
            },
        )
    }

    fn arm_root() -> AnswerOption {
        AnswerOption::new(
            "arm",
            "",
            OptionKind::Grouped {
                title: "Arm".to_string(),
                before_group: IrregularForm::singular("the"),
                after_group: IrregularForm::new("arm", "arms"),
                children: vec![AnswerOption::text("left-arm", "left")],
                options: vec![AnswerOption::text("arm-swollen", "swollen")],
            },
        )
    }

    fn question(order: GroupOrder) -> Question {
        Question::new("edema", "Edema")
            .with_kind(QuestionKind::Grouped {
                order,
                linking_verb: IrregularForm::new("is", "are"),
            })
            .with_options(vec![leg_root(), arm_root()])
    }

    fn item(root: &AnswerOption, id: &str) -> AnswerOption {
        root.children().iter().find(|c| c.id == id).unwrap().clone()
    }

    fn qualifier(root: &AnswerOption, id: &str) -> AnswerOption {
        match &root.kind {
            OptionKind::Grouped { options, .. } => options.iter().find(|o| o.id == id).unwrap().clone(),
            _ => unreachable!(),
        }
    }

    #[test]
    fn shared_qualifier_merges_items() {
        let root = leg_root();
        let mut agg = GroupedAggregator::new(&question(GroupOrder::QuestionThenAnswer));
        agg.option_selected(&item(&root, "left"), &qualifier(&root, "swollen"));
        agg.option_selected(&item(&root, "right"), &qualifier(&root, "swollen"));
        assert_eq!(
            agg.narrative_for(&root).trim(),
            "the left and right legs are swollen"
        );
    }

    #[test]
    fn distinct_qualifiers_are_comma_separated_in_selection_order() {
        let root = leg_root();
        let mut agg = GroupedAggregator::new(&question(GroupOrder::QuestionThenAnswer));
        agg.option_selected(&item(&root, "right"), &qualifier(&root, "red"));
        agg.option_selected(&item(&root, "left"), &qualifier(&root, "swollen"));
        assert_eq!(
            agg.narrative_for(&root).trim(),
            "the right leg is reddened, the left leg is swollen"
        );
    }

    #[test]
    fn answer_then_question_order() {
        let root = AnswerOption::new(
            "foot",
            "",
            OptionKind::Grouped {
                title: "Foot".to_string(),
                before_group: IrregularForm::default(),
                after_group: IrregularForm::new("foot", "feet"),
                children: vec![AnswerOption::text("l", "left"), AnswerOption::text("r", "right")],
                options: vec![AnswerOption::text("sw", "swelling")],
            },
        );
        let q = Question::new("feet", "Feet")
            .with_kind(QuestionKind::Grouped {
                order: GroupOrder::AnswerThenQuestion,
                linking_verb: IrregularForm::singular("noted in the"),
            })
            .with_options(vec![root.clone()]);
        let mut agg = GroupedAggregator::new(&q);
        agg.option_selected(&item(&root, "l"), &qualifier(&root, "sw"));
        agg.option_selected(&item(&root, "r"), &qualifier(&root, "sw"));
        assert_eq!(
            agg.narrative_for(&root).trim(),
            "swelling noted in the left and right feet"
        );
    }

    #[test]
    fn none_clears_root_and_is_evicted_by_others() {
        let root = leg_root();
        let left = item(&root, "left");
        let right = item(&root, "right");
        let mut agg = GroupedAggregator::new(&question(GroupOrder::QuestionThenAnswer));

        agg.option_selected(&left, &qualifier(&root, "swollen"));
        agg.option_selected(&right, &qualifier(&root, "normal"));
        assert!(agg.get_selected_option(&left).is_none());
        assert_eq!(agg.get_selected_option(&right).unwrap().id, "normal");

        agg.option_selected(&left, &qualifier(&root, "red"));
        assert!(agg.get_selected_option(&right).is_none());
        assert_eq!(agg.get_selected_option(&left).unwrap().id, "red");
    }

    #[test]
    fn none_does_not_touch_other_roots() {
        let leg = leg_root();
        let arm = arm_root();
        let mut agg = GroupedAggregator::new(&question(GroupOrder::QuestionThenAnswer));
        agg.option_selected(&item(&arm, "left-arm"), &qualifier(&arm, "arm-swollen"));
        agg.option_selected(&item(&leg, "left"), &qualifier(&leg, "normal"));
        assert!(agg.get_selected_option(&item(&arm, "left-arm")).is_some());
    }

    #[test]
    fn override_qualifier_replaces_composition() {
        let root = leg_root();
        let mut agg = GroupedAggregator::new(&question(GroupOrder::QuestionThenAnswer));
        let not_assessed = AnswerOption::new(
            "na",
            "legs not assessed",
            OptionKind::GroupedOverride {
                title: "Not assessed".to_string(),
                children: Vec::new(),
            },
        );
        agg.option_selected(&item(&root, "left"), &not_assessed);
        agg.option_selected(&item(&root, "right"), &not_assessed);
        assert_eq!(agg.narrative_for(&root), " legs not assessed");
    }

    #[test]
    fn next_button_joins_roots_with_semicolons() {
        let leg = leg_root();
        let arm = arm_root();
        let mut agg = GroupedAggregator::new(&question(GroupOrder::QuestionThenAnswer));
        assert!(agg.next_button_pressed().is_none());

        agg.option_selected(&item(&leg, "left"), &qualifier(&leg, "swollen"));
        agg.option_selected(&item(&arm, "left-arm"), &qualifier(&arm, "arm-swollen"));
        let result = agg.next_button_pressed().unwrap();
        assert_eq!(result.id, "leg");
        // Only the assembled string is trimmed; the note formatter collapses
        // the inner double space.
        assert_eq!(
            result.narrative,
            "the left leg is swollen;  the left arm is swollen"
        );
        assert_eq!(
            SentenceFormatter::default().format(&result.narrative),
            "The left leg is swollen; the left arm is swollen"
        );
    }

    #[test]
    fn remove_and_clear() {
        let root = leg_root();
        let left = item(&root, "left");
        let mut agg = GroupedAggregator::new(&question(GroupOrder::QuestionThenAnswer));
        agg.option_selected(&left, &qualifier(&root, "swollen"));
        agg.remove_selected_option(&left);
        assert!(!agg.has_selected_options());
        assert_eq!(agg.narrative_for(&root), "");

        agg.option_selected(&left, &qualifier(&root, "swollen"));
        agg.clear_answers();
        assert!(!agg.has_selected_options());
    }
}
