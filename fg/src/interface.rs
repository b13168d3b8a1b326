//! The shared and per-frame functional groups of one multi-frame instance.

use crate::group::{put_sequence, FunctionalGroup};
use crate::registry::registry;
use crate::types::{FunctionalGroupType, SharingClass};
use crate::{MissingFunctionalGroupsSnafu, NotPermittedSnafu, Result, StructureCheckSnafu};
use dicom_core::header::Header;
use dicom_dictionary_std::tags;
use dicom_object::InMemDicomObject;
use snafu::{ensure, OptionExt};
use std::collections::BTreeMap;
use tracing::{debug, error, warn};

type GroupMap = BTreeMap<FunctionalGroupType, Box<dyn FunctionalGroup>>;

/// The functional groups of an enhanced multi-frame object.
///
/// Groups are kept either in the shared bucket, applying to all frames,
/// or per frame.
/// A group type is never stored both shared and per-frame
/// when modified through this API:
/// adding a group as shared removes it from every frame,
/// and adding a group for a single frame
/// demotes a different shared group of the same type.
///
/// All groups are deep copies owned by the collection.
#[derive(Debug, Clone)]
pub struct FunctionalGroups {
    shared: GroupMap,
    per_frame: Vec<GroupMap>,
    check_on_write: bool,
}

impl Default for FunctionalGroups {
    fn default() -> Self {
        FunctionalGroups {
            shared: GroupMap::new(),
            per_frame: Vec::new(),
            check_on_write: true,
        }
    }
}

impl FunctionalGroups {
    /// Create an empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether [`write`](Self::write) validates the structure first.
    pub fn check_on_write(&self) -> bool {
        self.check_on_write
    }

    pub fn set_check_on_write(&mut self, check: bool) {
        self.check_on_write = check;
    }

    /// The number of frames with a per-frame entry.
    pub fn number_of_frames(&self) -> usize {
        self.per_frame.len()
    }

    /// Obtain the group of the given type applying to a frame.
    ///
    /// The per-frame group is returned if present,
    /// otherwise the shared one.
    /// The boolean is `true` when the group was found per-frame.
    pub fn get(
        &self,
        frame: usize,
        group_type: FunctionalGroupType,
    ) -> Option<(&dyn FunctionalGroup, bool)> {
        if let Some(group) = self.per_frame(frame, group_type) {
            return Some((group, true));
        }
        self.shared(group_type).map(|group| (group, false))
    }

    pub fn shared(&self, group_type: FunctionalGroupType) -> Option<&dyn FunctionalGroup> {
        self.shared.get(&group_type).map(|g| g.as_ref())
    }

    pub fn per_frame(
        &self,
        frame: usize,
        group_type: FunctionalGroupType,
    ) -> Option<&dyn FunctionalGroup> {
        self.per_frame
            .get(frame)
            .and_then(|groups| groups.get(&group_type))
            .map(|g| g.as_ref())
    }

    /// Iterate over all shared groups, ordered by type.
    pub fn shared_groups(&self) -> impl Iterator<Item = &dyn FunctionalGroup> {
        self.shared.values().map(|g| g.as_ref())
    }

    /// Iterate over the per-frame groups of one frame, ordered by type.
    ///
    /// Frames without an entry produce an empty iterator.
    pub fn frame_groups(&self, frame: usize) -> impl Iterator<Item = &dyn FunctionalGroup> {
        self.per_frame
            .get(frame)
            .into_iter()
            .flat_map(|groups| groups.values())
            .map(|g| g.as_ref())
    }

    /// Add a copy of the group as a shared group,
    /// replacing any shared group of the same type.
    ///
    /// Groups of the same type are removed from all frames.
    /// Fails if the group is only permitted per-frame.
    pub fn add_shared(&mut self, group: &dyn FunctionalGroup) -> Result<()> {
        let group_type = group.group_type();
        let sharing = group.sharing();
        ensure!(
            sharing != SharingClass::PerFrameOnly,
            NotPermittedSnafu {
                group_type,
                sharing,
                target: "as shared",
            }
        );
        let removed = self.remove_per_frame_all(group_type);
        if removed > 0 {
            debug!(
                "Removed {} per-frame group(s) of type {} now shared",
                removed, group_type
            );
        }
        self.shared.insert(group_type, group.clone_group());
        Ok(())
    }

    /// Add a copy of the group for the given frame,
    /// replacing any group of the same type in that frame.
    ///
    /// If a shared group of the same type exists with the same value,
    /// nothing is stored.
    /// If its value differs,
    /// the shared group is first copied to every frame and removed,
    /// so that the new group can take its place.
    /// Fails if the group is only permitted as shared.
    pub fn add_per_frame(&mut self, frame: usize, group: &dyn FunctionalGroup) -> Result<()> {
        let group_type = group.group_type();
        let sharing = group.sharing();
        ensure!(
            sharing != SharingClass::SharedOnly,
            NotPermittedSnafu {
                group_type,
                sharing,
                target: "per-frame",
            }
        );

        if self.per_frame.len() <= frame {
            self.per_frame.resize_with(frame + 1, GroupMap::new);
        }

        if let Some(shared) = self.shared.get(&group_type) {
            if shared.same_value(group) {
                return Ok(());
            }
            if let Some(shared) = self.shared.remove(&group_type) {
                debug!(
                    "Converting shared group of type {} to per-frame for {} frame(s)",
                    group_type,
                    self.per_frame.len()
                );
                for groups in &mut self.per_frame {
                    groups.insert(group_type, shared.clone_group());
                }
            }
        }

        self.per_frame[frame].insert(group_type, group.clone_group());
        Ok(())
    }

    /// Remove the shared group of the given type,
    /// returning whether it was present.
    pub fn remove_shared(&mut self, group_type: FunctionalGroupType) -> bool {
        self.shared.remove(&group_type).is_some()
    }

    /// Remove the group of the given type from one frame,
    /// returning whether it was present.
    pub fn remove_per_frame(&mut self, frame: usize, group_type: FunctionalGroupType) -> bool {
        self.per_frame
            .get_mut(frame)
            .and_then(|groups| groups.remove(&group_type))
            .is_some()
    }

    /// Remove the groups of the given type from all frames,
    /// returning the number of groups removed.
    pub fn remove_per_frame_all(&mut self, group_type: FunctionalGroupType) -> usize {
        self.per_frame
            .iter_mut()
            .filter_map(|groups| groups.remove(&group_type))
            .count()
    }

    /// Remove a frame and all its per-frame groups.
    /// Subsequent frames move down by one.
    pub fn remove_frame(&mut self, frame: usize) -> bool {
        if frame < self.per_frame.len() {
            self.per_frame.remove(frame);
            true
        } else {
            false
        }
    }

    /// Remove all shared and per-frame groups.
    pub fn clear(&mut self) {
        self.shared.clear();
        self.per_frame.clear();
    }

    /// Check the functional group structure,
    /// logging every problem found.
    ///
    /// The structure is valid when
    /// no group type is both shared and per-frame,
    /// no group is stored where its sharing class forbids it,
    /// and every frame has a Frame Content group.
    pub fn check(&self) -> bool {
        self.structure_errors() == 0
    }

    fn structure_errors(&self) -> usize {
        debug!(
            "Checking functional group structure for {} frames",
            self.per_frame.len()
        );
        let mut errors = 0;
        for (frame, groups) in self.per_frame.iter().enumerate() {
            for (group_type, group) in groups {
                if group_type.is_known() && self.shared.contains_key(group_type) {
                    error!(
                        "Functional group {} is shared and per-frame for frame #{}",
                        group_type, frame
                    );
                    errors += 1;
                }
                if !group.sharing().allows_per_frame() {
                    error!(
                        "Functional group {} can never be per-frame, but found for frame #{}",
                        group_type, frame
                    );
                    errors += 1;
                }
            }
            if !groups.contains_key(&FunctionalGroupType::FrameContent) {
                error!("Frame Content functional group missing for frame #{}", frame);
                errors += 1;
            }
        }
        for (group_type, group) in &self.shared {
            if !group.sharing().allows_shared() {
                error!(
                    "Functional group {} used as shared but must be per-frame",
                    group_type
                );
                errors += 1;
            }
        }
        errors
    }

    /// Read the functional groups of a multi-frame data set,
    /// replacing the content of this collection.
    ///
    /// Both functional groups sequences must be present and not empty.
    /// On failure, the collection is left empty.
    pub fn read(&mut self, dataset: &InMemDicomObject) -> Result<()> {
        self.clear();

        let shared_items = dataset
            .get(tags::SHARED_FUNCTIONAL_GROUPS_SEQUENCE)
            .and_then(|e| e.value().items())
            .filter(|items| !items.is_empty())
            .context(MissingFunctionalGroupsSnafu {
                name: "SharedFunctionalGroupsSequence",
            })?;
        if shared_items.len() > 1 {
            warn!(
                "SharedFunctionalGroupsSequence has {} items, only the first one is used",
                shared_items.len()
            );
        }
        let per_frame_items = dataset
            .get(tags::PER_FRAME_FUNCTIONAL_GROUPS_SEQUENCE)
            .and_then(|e| e.value().items())
            .filter(|items| !items.is_empty())
            .context(MissingFunctionalGroupsSnafu {
                name: "PerFrameFunctionalGroupsSequence",
            })?;

        let shared = read_item(&shared_items[0])?;
        let per_frame = per_frame_items
            .iter()
            .map(read_item)
            .collect::<Result<Vec<_>>>()?;

        self.shared = shared;
        self.per_frame = per_frame;
        Ok(())
    }

    /// Write the functional groups sequences into the data set,
    /// replacing existing ones.
    ///
    /// Unless disabled via [`set_check_on_write`](Self::set_check_on_write),
    /// the structure is checked first and nothing is written if invalid.
    pub fn write(&self, dataset: &mut InMemDicomObject) -> Result<()> {
        if self.check_on_write {
            let errors = self.structure_errors();
            ensure!(errors == 0, StructureCheckSnafu { errors });
        }

        let shared_item = write_item(&self.shared)?;
        let per_frame_items = self
            .per_frame
            .iter()
            .map(write_item)
            .collect::<Result<Vec<_>>>()?;

        put_sequence(
            dataset,
            tags::SHARED_FUNCTIONAL_GROUPS_SEQUENCE,
            vec![shared_item],
        );
        put_sequence(
            dataset,
            tags::PER_FRAME_FUNCTIONAL_GROUPS_SEQUENCE,
            per_frame_items,
        );
        Ok(())
    }
}

/// Read all groups in one functional groups item.
fn read_item(item: &InMemDicomObject) -> Result<GroupMap> {
    let mut groups = GroupMap::new();
    for elem in item {
        let tag = elem.tag();
        if elem.value().items().is_none() {
            warn!(
                "Ignoring non-sequence element {} in functional groups item",
                tag
            );
            continue;
        }
        let group = registry().read_group(item, tag)?;
        groups.insert(group.group_type(), group);
    }
    Ok(groups)
}

fn write_item(groups: &GroupMap) -> Result<InMemDicomObject> {
    let mut item = InMemDicomObject::new_empty();
    for group in groups.values() {
        group.write(&mut item)?;
    }
    Ok(item)
}
