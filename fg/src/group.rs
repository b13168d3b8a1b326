//! The functional group interface and helpers for implementing it.

use crate::types::{FunctionalGroupType, SharingClass};
use crate::{ConvertValueSnafu, EmptySequenceSnafu, MissingSequenceSnafu, Result};
use dicom_core::header::Header;
use dicom_core::value::{DataSetSequence, PrimitiveValue, Value};
use dicom_core::{DataElement, Tag, VR};
use dicom_object::InMemDicomObject;
use num_traits::NumCast;
use snafu::{OptionExt, ResultExt};
use std::any::Any;
use std::cmp::Ordering;
use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

/// A functional group of an enhanced multi-frame object.
///
/// A group lives inside an item of one of the functional groups sequences,
/// as a single sequence element named after the group
/// (see [`FunctionalGroupType::sequence_tag`]).
pub trait FunctionalGroup: fmt::Debug + Send + Sync + Any {
    /// The type of this functional group.
    fn group_type(&self) -> FunctionalGroupType;

    /// Whether the group may be shared, per-frame, or both.
    fn sharing(&self) -> SharingClass {
        self.group_type().sharing()
    }

    /// Read the group from a functional groups item,
    /// replacing all of its previous content.
    fn read(&mut self, item: &InMemDicomObject) -> Result<()>;

    /// Write the group into a functional groups item,
    /// replacing any existing sequence of the same group.
    fn write(&self, item: &mut InMemDicomObject) -> Result<()>;

    /// Compare this group with another one by value.
    ///
    /// Groups of different concrete types never compare equal.
    fn compare(&self, other: &dyn FunctionalGroup) -> Ordering;

    /// Create a deep copy of this group.
    fn clone_group(&self) -> Box<dyn FunctionalGroup>;

    /// Obtain this group as [`Any`], to enable downcasting.
    fn as_any(&self) -> &dyn Any;
}

impl<'a> dyn FunctionalGroup + 'a {
    /// Retrieve the concrete group behind this trait object.
    pub fn downcast_ref<T: FunctionalGroup>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    /// Whether the two groups hold the same value.
    pub fn same_value(&self, other: &dyn FunctionalGroup) -> bool {
        self.compare(other) == Ordering::Equal
    }
}

impl Clone for Box<dyn FunctionalGroup> {
    fn clone(&self) -> Self {
        self.clone_group()
    }
}

/// Compare a concrete group with any other group,
/// using `f` when both are of the same concrete type.
pub(crate) fn compare_with<T, F>(this: &T, other: &dyn FunctionalGroup, f: F) -> Ordering
where
    T: FunctionalGroup,
    F: FnOnce(&T, &T) -> Ordering,
{
    match other.downcast_ref::<T>() {
        Some(other) => this
            .group_type()
            .cmp(&other.group_type())
            .then_with(|| f(this, other)),
        // same group type, but a different representation
        None => this
            .group_type()
            .cmp(&other.group_type())
            .then_with(|| this.as_any().type_id().cmp(&other.as_any().type_id())),
    }
}

/// Whether two lists of data set items hold the same content.
///
/// Element lengths are ignored,
/// so that sequences of undefined length compare by their items.
pub(crate) fn same_items(a: &[InMemDicomObject], b: &[InMemDicomObject]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(a, b)| same_data_set(a, b))
}

/// Whether two data sets hold the same elements with the same values.
pub(crate) fn same_data_set(a: &InMemDicomObject, b: &InMemDicomObject) -> bool {
    a.into_iter().len() == b.into_iter().len()
        && a.into_iter().zip(b).all(|(a, b)| {
            a.tag() == b.tag()
                && a.vr() == b.vr()
                && match (a.value(), b.value()) {
                    (Value::Primitive(a), Value::Primitive(b)) => a == b,
                    (Value::Sequence(a), Value::Sequence(b)) => same_items(a.items(), b.items()),
                    (Value::PixelSequence(a), Value::PixelSequence(b)) => {
                        a.offset_table() == b.offset_table() && a.fragments() == b.fragments()
                    }
                    _ => false,
                }
        })
}

/// Fetch the first item of a functional group sequence.
pub(crate) fn first_item(
    item: &InMemDicomObject,
    group_type: FunctionalGroupType,
) -> Result<&InMemDicomObject> {
    let items = sequence_items(item, group_type)?;
    items.first().context(EmptySequenceSnafu { group_type })
}

/// Fetch all items of a functional group sequence.
pub(crate) fn sequence_items(
    item: &InMemDicomObject,
    group_type: FunctionalGroupType,
) -> Result<&[InMemDicomObject]> {
    let tag = group_type.sequence_tag();
    item.get(tag)
        .and_then(|e| e.value().items())
        .context(MissingSequenceSnafu { group_type, tag })
}

/// Put a sequence with the given items, replacing any previous element.
pub(crate) fn put_sequence(item: &mut InMemDicomObject, tag: Tag, items: Vec<InMemDicomObject>) {
    item.put(DataElement::new(tag, VR::SQ, DataSetSequence::from(items)));
}

pub(crate) fn get_string(item: &InMemDicomObject, tag: Tag) -> Option<String> {
    item.get(tag)
        .and_then(|e| e.to_str().ok())
        .map(|s| s.trim_end_matches([' ', '\0']).to_string())
        .filter(|s| !s.is_empty())
}

pub(crate) fn get_int<T>(
    item: &InMemDicomObject,
    tag: Tag,
    group_type: FunctionalGroupType,
    name: &'static str,
) -> Result<Option<T>>
where
    T: Clone + NumCast + FromStr<Err = ParseIntError>,
{
    match item.get(tag) {
        None => Ok(None),
        Some(e) if e.value().multiplicity() == 0 => Ok(None),
        Some(e) => e
            .to_int::<T>()
            .map(Some)
            .context(ConvertValueSnafu { group_type, name }),
    }
}

pub(crate) fn get_multi_int<T>(
    item: &InMemDicomObject,
    tag: Tag,
    group_type: FunctionalGroupType,
    name: &'static str,
) -> Result<Vec<T>>
where
    T: Clone + NumCast + FromStr<Err = ParseIntError>,
{
    match item.get(tag) {
        None => Ok(Vec::new()),
        Some(e) => e
            .to_multi_int::<T>()
            .context(ConvertValueSnafu { group_type, name }),
    }
}

pub(crate) fn get_multi_float(
    item: &InMemDicomObject,
    tag: Tag,
    group_type: FunctionalGroupType,
    name: &'static str,
) -> Result<Vec<f64>> {
    match item.get(tag) {
        None => Ok(Vec::new()),
        Some(e) if e.value().multiplicity() == 0 => Ok(Vec::new()),
        Some(e) => e
            .to_multi_float64()
            .context(ConvertValueSnafu { group_type, name }),
    }
}

/// Put a decimal string (DS) value with one or more numbers.
pub(crate) fn put_decimals(item: &mut InMemDicomObject, tag: Tag, values: &[f64]) {
    let strings = values.iter().map(|v| v.to_string()).collect();
    item.put(DataElement::new(tag, VR::DS, PrimitiveValue::Strs(strings)));
}

/// Total order over float sequences.
pub(crate) fn cmp_floats(a: &[f64], b: &[f64]) -> Ordering {
    a.len().cmp(&b.len()).then_with(|| {
        a.iter()
            .zip(b)
            .map(|(x, y)| x.total_cmp(y))
            .find(|o| o.is_ne())
            .unwrap_or(Ordering::Equal)
    })
}

pub(crate) fn cmp_opt_float(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.total_cmp(&b),
        (a, b) => a.is_some().cmp(&b.is_some()),
    }
}
