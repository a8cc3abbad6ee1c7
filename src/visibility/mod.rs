//! Who may see which shared row.
//!
//! Notes, todos, shopping items and events carry an optional `partner_id` or
//! `group_id`. A row is visible to a [`Viewer`] when its scope admits the viewer,
//! either directly or through the topic it is filed under. Callers fetch a
//! superset of candidate rows with SQL and narrow it here, keeping the query's
//! ORDER BY.

mod attribution;

pub use attribution::{partner_topic_name, topic_name_counterpart};

use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum VisibilityError {
    #[error("partner_id and group_id cannot both be set")]
    ConflictingScope,

    #[error("User {0} is not your partner")]
    NotPartner(Uuid),

    #[error("You are not a member of group {0}")]
    NotGroupMember(Uuid),
}

/// Sharing scope of a row, derived from its nullable `partner_id` / `group_id` columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShareScope {
    Private,
    Partner(Uuid),
    Group(Uuid),
}

impl ShareScope {
    pub fn from_columns(partner_id: Option<Uuid>, group_id: Option<Uuid>) -> Result<Self, VisibilityError> {
        match (partner_id, group_id) {
            (None, None) => Ok(ShareScope::Private),
            (Some(p), None) => Ok(ShareScope::Partner(p)),
            (None, Some(g)) => Ok(ShareScope::Group(g)),
            (Some(_), Some(_)) => Err(VisibilityError::ConflictingScope),
        }
    }

    pub fn partner_id(&self) -> Option<Uuid> {
        match self {
            ShareScope::Partner(p) => Some(*p),
            _ => None,
        }
    }

    pub fn group_id(&self) -> Option<Uuid> {
        match self {
            ShareScope::Group(g) => Some(*g),
            _ => None,
        }
    }

    pub fn is_shared(&self) -> bool {
        !matches!(self, ShareScope::Private)
    }
}

/// A row that can be shared with a partner or a group
pub trait Shared {
    fn created_by(&self) -> Uuid;
    fn partner_id(&self) -> Option<Uuid>;
    fn group_id(&self) -> Option<Uuid>;

    fn topic_id(&self) -> Option<Uuid> {
        None
    }

    fn scope(&self) -> Result<ShareScope, VisibilityError> {
        ShareScope::from_columns(self.partner_id(), self.group_id())
    }
}

/// Which slice of the visible rows a list call wants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ViewFilter {
    #[default]
    All,
    Personal,
    Partner(Uuid),
    Group(Uuid),
}

/// Query-string form of [`ViewFilter`]: `?partner_id=` / `?group_id=` / `?personal=true`
#[derive(Debug, Default, Deserialize)]
pub struct ViewQuery {
    pub partner_id: Option<Uuid>,
    pub group_id: Option<Uuid>,
    #[serde(default)]
    pub personal: bool,
}

impl ViewQuery {
    pub fn into_filter(self) -> Result<ViewFilter, VisibilityError> {
        match (self.partner_id, self.group_id, self.personal) {
            (Some(_), Some(_), _) => Err(VisibilityError::ConflictingScope),
            (Some(p), None, _) => Ok(ViewFilter::Partner(p)),
            (None, Some(g), _) => Ok(ViewFilter::Group(g)),
            (None, None, true) => Ok(ViewFilter::Personal),
            (None, None, false) => Ok(ViewFilter::All),
        }
    }
}

/// Topic as seen by the filter
#[derive(Debug, Clone)]
pub struct TopicRef {
    pub id: Uuid,
    pub name: String,
    pub created_by: Uuid,
    pub partner_id: Option<Uuid>,
    pub group_id: Option<Uuid>,
}

/// The signed-in user together with everything visibility depends on
#[derive(Debug, Clone)]
pub struct Viewer {
    pub user_id: Uuid,
    partners: HashSet<Uuid>,
    groups: HashSet<Uuid>,
    topics: HashMap<Uuid, TopicRef>,
    /// lowercase username -> user id, for the viewer and their partners
    usernames: HashMap<String, Uuid>,
}

impl Viewer {
    pub fn new(user_id: Uuid) -> Self {
        Self {
            user_id,
            partners: HashSet::new(),
            groups: HashSet::new(),
            topics: HashMap::new(),
            usernames: HashMap::new(),
        }
    }

    pub fn with_partners(mut self, partners: impl IntoIterator<Item = Uuid>) -> Self {
        self.partners.extend(partners.into_iter().filter(|p| *p != self.user_id));
        self
    }

    pub fn with_groups(mut self, groups: impl IntoIterator<Item = Uuid>) -> Self {
        self.groups.extend(groups);
        self
    }

    pub fn with_topics(mut self, topics: impl IntoIterator<Item = TopicRef>) -> Self {
        self.topics.extend(topics.into_iter().map(|t| (t.id, t)));
        self
    }

    pub fn with_usernames<S: AsRef<str>>(mut self, names: impl IntoIterator<Item = (Uuid, S)>) -> Self {
        self.usernames
            .extend(names.into_iter().map(|(id, name)| (name.as_ref().trim().to_lowercase(), id)));
        self
    }

    pub fn is_partner(&self, user_id: Uuid) -> bool {
        self.partners.contains(&user_id)
    }

    pub fn is_member(&self, group_id: Uuid) -> bool {
        self.groups.contains(&group_id)
    }

    pub fn partners(&self) -> impl Iterator<Item = &Uuid> {
        self.partners.iter()
    }

    pub fn groups(&self) -> impl Iterator<Item = &Uuid> {
        self.groups.iter()
    }

    /// Users whose rows may be visible: the viewer plus every partner
    pub fn circle(&self) -> Vec<Uuid> {
        std::iter::once(self.user_id).chain(self.partners.iter().copied()).collect()
    }

    pub fn group_ids(&self) -> Vec<Uuid> {
        self.groups.iter().copied().collect()
    }

    /// Check that the viewer may file a new row under `scope`
    pub fn authorize_scope(&self, scope: ShareScope) -> Result<(), VisibilityError> {
        match scope {
            ShareScope::Private => Ok(()),
            ShareScope::Partner(p) if self.is_partner(p) => Ok(()),
            ShareScope::Partner(p) => Err(VisibilityError::NotPartner(p)),
            ShareScope::Group(g) if self.is_member(g) => Ok(()),
            ShareScope::Group(g) => Err(VisibilityError::NotGroupMember(g)),
        }
    }

    /// Effective scope and owner of a topic. Legacy topics without scope columns fall
    /// back to "Notes with <username>" naming.
    pub fn topic_scope(&self, topic_id: Uuid) -> Option<(Uuid, ShareScope)> {
        let topic = self.topics.get(&topic_id)?;
        let scope = match ShareScope::from_columns(topic.partner_id, topic.group_id) {
            Ok(ShareScope::Private) => topic_name_counterpart(&topic.name, topic.created_by, &self.usernames)
                .map(ShareScope::Partner)
                .unwrap_or(ShareScope::Private),
            Ok(scope) => scope,
            Err(_) => return None,
        };
        Some((topic.created_by, scope))
    }

    /// The viewer may read and file rows under this topic
    pub fn can_use_topic(&self, topic_id: Uuid) -> bool {
        self.topic_scope(topic_id)
            .is_some_and(|(owner, scope)| self.admits(owner, scope))
    }

    /// Topics whose rows the viewer may read, used to widen candidate queries
    pub fn usable_topic_ids(&self) -> Vec<Uuid> {
        self.topics.keys().copied().filter(|id| self.can_use_topic(*id)).collect()
    }

    /// Scope a new row filed under `topic_id` takes, expressed from the viewer's side:
    /// a topic shared *to* the viewer yields a row shared back to the topic owner.
    pub fn inherited_scope(&self, topic_id: Uuid) -> Option<ShareScope> {
        let (owner, scope) = self.topic_scope(topic_id)?;
        if !self.admits(owner, scope) {
            return None;
        }
        Some(match scope {
            ShareScope::Partner(p) if p == self.user_id => ShareScope::Partner(owner),
            other => other,
        })
    }

    fn admits(&self, creator: Uuid, scope: ShareScope) -> bool {
        match scope {
            ShareScope::Private => creator == self.user_id,
            ShareScope::Group(g) => self.is_member(g),
            ShareScope::Partner(p) => {
                (self.user_id == p && self.is_partner(creator)) || (self.user_id == creator && self.is_partner(p))
            }
        }
    }

    /// Shared scope a row inherits from its topic, if the topic is shared and admits the viewer
    fn shared_topic_scope<T: Shared>(&self, row: &T) -> Option<(Uuid, ShareScope)> {
        let (owner, scope) = self.topic_scope(row.topic_id()?)?;
        (scope.is_shared() && self.admits(owner, scope)).then_some((owner, scope))
    }

    pub fn can_see<T: Shared>(&self, row: &T) -> bool {
        let scope = match row.scope() {
            Ok(scope) => scope,
            Err(_) => return false,
        };
        self.admits(row.created_by(), scope) || self.shared_topic_scope(row).is_some()
    }

    fn matches<T: Shared>(&self, row: &T, filter: ViewFilter) -> bool {
        if !self.can_see(row) {
            return false;
        }
        let Ok(scope) = row.scope() else {
            return false;
        };
        let topic = self.shared_topic_scope(row);

        match filter {
            ViewFilter::All => true,
            ViewFilter::Personal => {
                scope == ShareScope::Private && row.created_by() == self.user_id && topic.is_none()
            }
            ViewFilter::Group(g) => {
                self.is_member(g) && (scope == ShareScope::Group(g) || topic.map(|(_, s)| s) == Some(ShareScope::Group(g)))
            }
            ViewFilter::Partner(p) => {
                if !self.is_partner(p) {
                    return false;
                }
                let in_group = scope.group_id().is_some() || topic.and_then(|(_, s)| s.group_id()).is_some();
                if in_group {
                    return false;
                }
                let pair_scoped = |owner: Uuid, s: ShareScope| match s {
                    ShareScope::Partner(x) => (owner == p && x == self.user_id) || (owner == self.user_id && x == p),
                    _ => false,
                };
                row.created_by() == p
                    || pair_scoped(row.created_by(), scope)
                    || topic.is_some_and(|(owner, s)| pair_scoped(owner, s))
            }
        }
    }

    /// Keep the rows matching `filter`, in their original order
    pub fn retain<T: Shared>(&self, rows: Vec<T>, filter: ViewFilter) -> Vec<T> {
        rows.into_iter().filter(|row| self.matches(row, filter)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone)]
    struct Row {
        label: &'static str,
        created_by: Uuid,
        partner_id: Option<Uuid>,
        group_id: Option<Uuid>,
        topic_id: Option<Uuid>,
    }

    impl Shared for Row {
        fn created_by(&self) -> Uuid {
            self.created_by
        }
        fn partner_id(&self) -> Option<Uuid> {
            self.partner_id
        }
        fn group_id(&self) -> Option<Uuid> {
            self.group_id
        }
        fn topic_id(&self) -> Option<Uuid> {
            self.topic_id
        }
    }

    fn row(label: &'static str, created_by: Uuid) -> Row {
        Row {
            label,
            created_by,
            partner_id: None,
            group_id: None,
            topic_id: None,
        }
    }

    fn labels(rows: &[Row]) -> Vec<&'static str> {
        rows.iter().map(|r| r.label).collect()
    }

    struct World {
        me: Uuid,
        partner: Uuid,
        stranger: Uuid,
        my_group: Uuid,
        other_group: Uuid,
    }

    fn world() -> World {
        World {
            me: Uuid::new_v4(),
            partner: Uuid::new_v4(),
            stranger: Uuid::new_v4(),
            my_group: Uuid::new_v4(),
            other_group: Uuid::new_v4(),
        }
    }

    fn viewer(w: &World) -> Viewer {
        Viewer::new(w.me).with_partners([w.partner]).with_groups([w.my_group])
    }

    #[test]
    fn group_rows_visible_only_to_members() {
        let w = world();
        let v = viewer(&w);
        let mine = Row { group_id: Some(w.my_group), ..row("mine", w.stranger) };
        let theirs = Row { group_id: Some(w.other_group), ..row("theirs", w.me) };
        assert!(v.can_see(&mine));
        assert!(!v.can_see(&theirs));
    }

    #[test]
    fn partner_rows_visible_to_both_sides_of_the_link() {
        let w = world();
        let v = viewer(&w);
        let to_me = Row { partner_id: Some(w.me), ..row("to me", w.partner) };
        let from_me = Row { partner_id: Some(w.partner), ..row("from me", w.me) };
        let to_me_from_stranger = Row { partner_id: Some(w.me), ..row("stranger", w.stranger) };
        let from_me_to_stranger = Row { partner_id: Some(w.stranger), ..row("unlinked", w.me) };
        assert!(v.can_see(&to_me));
        assert!(v.can_see(&from_me));
        assert!(!v.can_see(&to_me_from_stranger));
        assert!(!v.can_see(&from_me_to_stranger));
    }

    #[test]
    fn private_rows_visible_only_to_creator() {
        let w = world();
        let v = viewer(&w);
        assert!(v.can_see(&row("mine", w.me)));
        assert!(!v.can_see(&row("partner private", w.partner)));
    }

    #[test]
    fn conflicting_columns_hide_the_row() {
        let w = world();
        let v = viewer(&w);
        let bad = Row {
            partner_id: Some(w.partner),
            group_id: Some(w.my_group),
            ..row("bad", w.me)
        };
        assert!(!v.can_see(&bad));
    }

    #[test]
    fn topic_membership_shares_untagged_rows() {
        let w = world();
        let topic = TopicRef {
            id: Uuid::new_v4(),
            name: "Trip planning".to_string(),
            created_by: w.partner,
            partner_id: Some(w.me),
            group_id: None,
        };
        let v = viewer(&w).with_topics([topic.clone()]);
        let filed = Row { topic_id: Some(topic.id), ..row("filed", w.partner) };
        assert!(v.can_see(&filed));
        assert_eq!(labels(&v.retain(vec![filed.clone()], ViewFilter::Partner(w.partner))), vec!["filed"]);
        assert!(v.retain(vec![filed], ViewFilter::Personal).is_empty());
    }

    #[test]
    fn partner_filter_keeps_pair_rows_in_order() {
        let w = world();
        let v = viewer(&w);
        let rows = vec![
            Row { partner_id: Some(w.partner), ..row("a", w.me) },
            row("personal", w.me),
            Row { partner_id: Some(w.me), ..row("b", w.partner) },
            Row { group_id: Some(w.my_group), ..row("group by partner", w.partner) },
            Row { partner_id: Some(w.me), ..row("c", w.partner) },
        ];
        assert_eq!(labels(&v.retain(rows, ViewFilter::Partner(w.partner))), vec!["a", "b", "c"]);
    }

    #[test]
    fn partner_filter_for_non_partner_is_empty() {
        let w = world();
        let v = viewer(&w);
        let rows = vec![Row { partner_id: Some(w.me), ..row("x", w.stranger) }];
        assert!(v.retain(rows, ViewFilter::Partner(w.stranger)).is_empty());
    }

    #[test]
    fn group_filter_requires_membership_and_matching_group() {
        let w = world();
        let v = viewer(&w);
        let rows = vec![
            Row { group_id: Some(w.my_group), ..row("g1", w.stranger) },
            Row { group_id: Some(w.other_group), ..row("g2", w.stranger) },
            row("personal", w.me),
        ];
        assert_eq!(labels(&v.retain(rows.clone(), ViewFilter::Group(w.my_group))), vec!["g1"]);
        assert!(v.retain(rows, ViewFilter::Group(w.other_group)).is_empty());
    }

    #[test]
    fn personal_filter_keeps_only_private_rows() {
        let w = world();
        let v = viewer(&w);
        let rows = vec![
            row("mine", w.me),
            Row { partner_id: Some(w.partner), ..row("shared", w.me) },
            Row { group_id: Some(w.my_group), ..row("group", w.me) },
        ];
        assert_eq!(labels(&v.retain(rows, ViewFilter::Personal)), vec!["mine"]);
    }

    #[test]
    fn legacy_topic_names_attribute_partner() {
        let w = world();
        let topic = TopicRef {
            id: Uuid::new_v4(),
            name: "Notes with Alex".to_string(),
            created_by: w.me,
            partner_id: None,
            group_id: None,
        };
        let v = viewer(&w)
            .with_usernames([(w.me, "sam"), (w.partner, "alex")])
            .with_topics([topic.clone()]);
        assert_eq!(v.topic_scope(topic.id), Some((w.me, ShareScope::Partner(w.partner))));

        let partner_note = Row { topic_id: Some(topic.id), ..row("note", w.partner) };
        assert!(v.can_see(&partner_note));
    }

    #[test]
    fn rows_filed_under_shared_topic_point_back_at_owner() {
        let w = world();
        let shared_to_me = TopicRef {
            id: Uuid::new_v4(),
            name: "Weekend".to_string(),
            created_by: w.partner,
            partner_id: Some(w.me),
            group_id: None,
        };
        let foreign = TopicRef {
            id: Uuid::new_v4(),
            name: "Secret".to_string(),
            created_by: w.stranger,
            partner_id: None,
            group_id: None,
        };
        let v = viewer(&w).with_topics([shared_to_me.clone(), foreign.clone()]);
        assert_eq!(v.inherited_scope(shared_to_me.id), Some(ShareScope::Partner(w.partner)));
        assert!(v.can_use_topic(shared_to_me.id));
        assert_eq!(v.inherited_scope(foreign.id), None);
        assert!(!v.can_use_topic(foreign.id));
        assert!(!v.can_use_topic(Uuid::new_v4()));
    }

    #[test]
    fn authorize_scope_checks_links_and_membership() {
        let w = world();
        let v = viewer(&w);
        assert!(v.authorize_scope(ShareScope::Private).is_ok());
        assert!(v.authorize_scope(ShareScope::Partner(w.partner)).is_ok());
        assert_eq!(
            v.authorize_scope(ShareScope::Partner(w.stranger)),
            Err(VisibilityError::NotPartner(w.stranger))
        );
        assert_eq!(
            v.authorize_scope(ShareScope::Group(w.other_group)),
            Err(VisibilityError::NotGroupMember(w.other_group))
        );
    }

    #[test]
    fn view_query_rejects_both_filters() {
        let q = ViewQuery {
            partner_id: Some(Uuid::new_v4()),
            group_id: Some(Uuid::new_v4()),
            personal: false,
        };
        assert_eq!(q.into_filter(), Err(VisibilityError::ConflictingScope));
        assert_eq!(ViewQuery::default().into_filter(), Ok(ViewFilter::All));
    }
}
