/*!
 * Match Set Builder: turns Grouping Engine matches into ordered groups of
 * duplicate [`FileId`]s, ready for reporting or deletion.
 */

use std::cmp::Ordering;

use crate::config::OrderBy;

use super::file_record::{FileArena, FileId, FileRecord, GroupId};

/// One set of files the Grouping Engine has determined are duplicates of
/// each other. Member order reflects the configured `order_by`/`reverse`
/// policy; position 0 is the file every deletion mode treats as "kept".
#[derive(Debug, Default)]
pub struct Group {
    pub members: Vec<FileId>,
}

#[derive(Debug)]
pub struct MatchSetBuilder {
    groups: Vec<Group>,
    order_by: OrderBy,
    reverse: bool,
}

impl MatchSetBuilder {
    pub fn new(order_by: OrderBy, reverse: bool) -> Self {
        Self {
            groups: Vec::new(),
            order_by,
            reverse,
        }
    }

    pub fn members(&self, id: GroupId) -> &[FileId] {
        &self.groups[id.0].members
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn groups(&self) -> impl Iterator<Item = (GroupId, &Group)> {
        self.groups.iter().enumerate().map(|(i, g)| (GroupId(i), g))
    }

    /// Attach `incoming` to `peer`'s group, creating a fresh two-member
    /// group if `peer` hadn't been grouped yet. Returns the group's id.
    pub fn attach(&mut self, incoming: FileId, peer: FileId, arena: &mut FileArena) -> GroupId {
        let group_id = match arena.get(peer).group {
            Some(id) => id,
            None => {
                let id = GroupId(self.groups.len());
                self.groups.push(Group { members: vec![peer] });
                arena.get_mut(peer).group = Some(id);
                id
            }
        };

        let position = self.insertion_position(group_id, incoming, arena);
        self.groups[group_id.0].members.insert(position, incoming);
        arena.get_mut(incoming).group = Some(group_id);
        group_id
    }

    /// Find the first peer that compares `>= incoming` and displace it
    /// (insert `incoming` just before it); append at the tail if none does.
    /// The comparison is inclusive of ties on purpose — `Discovery` is the
    /// one exception: `compare_members` hardcodes `Ordering::Equal` there to
    /// get append-only arrival order, so an inclusive-tie displacement would
    /// insert every arrival at the head instead. Discovery short-circuits to
    /// always appending.
    fn insertion_position(&self, group_id: GroupId, incoming: FileId, arena: &FileArena) -> usize {
        let members = &self.groups[group_id.0].members;
        if matches!(self.order_by, OrderBy::Discovery) {
            return members.len();
        }

        let incoming_rec = arena.get(incoming);
        let mut position = members.len();
        for (i, &member) in members.iter().enumerate() {
            if self.compare(arena.get(member), incoming_rec) != Ordering::Less {
                position = i;
                break;
            }
        }
        position
    }

    fn compare(&self, a: &FileRecord, b: &FileRecord) -> Ordering {
        compare_members(self.order_by, self.reverse, a, b)
    }
}

/// Shared ordering used both to place a new member within a group and, in
/// immediate deletion mode, to decide which of two confirmed-equal files
/// the keeper is (the one that compares `>=` the other).
pub fn compare_members(order_by: OrderBy, reverse: bool, a: &FileRecord, b: &FileRecord) -> Ordering {
    let base = match order_by {
        // Discovery order is insertion order: a new arrival never sorts
        // ahead of what's already there, so it always lands at the end.
        OrderBy::Discovery => Ordering::Equal,
        OrderBy::Name => a.path.cmp(&b.path),
        OrderBy::Time => a.mtime.cmp(&b.mtime).then_with(|| a.ctime.cmp(&b.ctime)),
        OrderBy::Ctime => a.ctime.cmp(&b.ctime).then_with(|| a.mtime.cmp(&b.mtime)),
    };
    if reverse {
        base.reverse()
    } else {
        base
    }
}
