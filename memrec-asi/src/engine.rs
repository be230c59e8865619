//! Aggregate structure identification.
//!
//! Each memory access constrains the layout of the a-locs its address may
//! touch: a constant address carves a field out of its a-loc, a strided
//! address reveals an array. The engine folds every access's constraint
//! into the running a-loc → type map by unifying the inferred shape with
//! whatever shape the map already holds.

use std::cmp::Ordering;
use std::collections::{BTreeMap, VecDeque};

use itertools::Itertools;
use num_integer::lcm;
use tracing::{debug, trace};

use memrec_vsa::{ALoc, BoundedInt, RegionId, Ric, ValueSet};

use crate::error::AsiError;
use crate::types::{AsiType, TypeKind};

/// Identifier of one memory access, typically the id of the program point
/// that performed it. Accesses are replayed in ascending id order.
pub type AccessId = u64;

/// One memory access: the value-set of addresses it may touch and the
/// number of bytes it moves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Access {
    pub address: ValueSet,
    pub size: i64,
}

impl Access {
    pub fn new(address: ValueSet, size: i64) -> Self {
        Self { address, size }
    }
}

/// The identification engine: replays accesses against an a-loc → type map
/// and refines the map as constraints accumulate.
#[derive(Debug, Clone)]
pub struct Asi {
    accesses: BTreeMap<AccessId, Access>,
    types: BTreeMap<ALoc, AsiType>,
}

impl Asi {
    /// Bind every a-loc to an opaque scalar of its own size. Input a-locs
    /// must not overlap within a region.
    pub fn new(
        a_locs: impl IntoIterator<Item = ALoc>,
        accesses: BTreeMap<AccessId, Access>,
    ) -> Result<Self, AsiError> {
        let mut sorted: Vec<ALoc> = a_locs.into_iter().collect();
        sorted.sort_unstable();
        sorted.dedup();

        for window in sorted.windows(2) {
            if window[0].overlaps(&window[1]) {
                return Err(AsiError::OverlappingALocs {
                    first: window[0],
                    second: window[1],
                });
            }
        }

        let types = sorted
            .into_iter()
            .map(|aloc| (aloc, AsiType::int(aloc.size)))
            .collect();

        Ok(Self { accesses, types })
    }

    /// The current a-loc → type map.
    pub fn types(&self) -> &BTreeMap<ALoc, AsiType> {
        &self.types
    }

    pub fn into_types(self) -> BTreeMap<ALoc, AsiType> {
        self.types
    }

    /// All a-locs the address may touch, grouped by region. An a-loc is
    /// touched when either end of the address range lands inside it, or the
    /// range straddles it entirely.
    pub fn find_alocs(&self, address: &ValueSet) -> BTreeMap<RegionId, Vec<ALoc>> {
        let mut referenced: BTreeMap<RegionId, Vec<ALoc>> = BTreeMap::new();

        for aloc in self.types.keys() {
            let Some(ric) = address.get(aloc.region) else {
                continue;
            };

            let lower = ric.lower();
            let upper = ric.upper();
            let first = BoundedInt::finite(aloc.offset);
            let past = BoundedInt::finite(aloc.end());

            let lower_inside = lower >= first && lower < past;
            let upper_inside = upper >= first && upper < past;
            let straddles = lower < first && upper >= past;

            if lower_inside || upper_inside || straddles {
                referenced.entry(aloc.region).or_default().push(*aloc);
            }
        }

        referenced
    }

    /// Interpret a `size`-byte access whose offsets within `at`'s region
    /// are described by the address value-set, as a type covering `at`.
    pub fn infer(address: &ValueSet, size: i64, at: ALoc) -> Result<AsiType, AsiError> {
        let ric = *address
            .get(at.region)
            .ok_or(AsiError::MissingAddressRegion { region: at.region })?;

        // An empty offset set accesses nothing and constrains nothing.
        if ric.is_bottom() {
            return Ok(AsiType::int(at.size));
        }

        if let Some(value) = ric.as_constant() {
            return Ok(Self::infer_scalar(value - at.offset, size, at.size));
        }

        Self::infer_array(&ric, size, at)
    }

    /// A constant address carves a field out of the a-loc: remainder,
    /// accessed bytes, remainder.
    fn infer_scalar(offset: i64, size: i64, total: i64) -> AsiType {
        if offset < 0 || offset >= total {
            let mut out = AsiType::int(total);
            out.set_buffer_overflow(true);
            return out;
        }

        let mut overflow = false;
        let mut size = size;
        if offset + size > total {
            overflow = true;
            size = total - offset;
        }

        let mut out = Self::carve(offset, size, total);
        if overflow {
            out.set_buffer_overflow(true);
        }
        out
    }

    /// A strided address reveals an array of `stride`-byte elements.
    fn infer_array(ric: &Ric, size: i64, at: ALoc) -> Result<AsiType, AsiError> {
        let stride = ric.stride();
        let mut overflow = false;

        // An access wider than the stride overlaps its neighbouring
        // elements; clamp it to one element.
        let mut size = size;
        if size > stride {
            overflow = true;
            size = stride;
        }

        let element = if size == stride {
            AsiType::int(size)
        } else {
            let element_offset = (ric.offset() - at.offset).rem_euclid(stride);
            if element_offset + size > stride {
                overflow = true;
                AsiType::int(stride)
            } else {
                Self::carve(element_offset, size, stride)
            }
        };

        let (Some(first), Some(last)) = (ric.start().as_finite(), ric.end().as_finite()) else {
            return Err(AsiError::InfiniteArrayAccess);
        };

        let mut accessed = last - first + 1;

        // Anchor the array at the first accessed element, not at the grid
        // representative: the offset may sit many strides away from the
        // range it denotes.
        let base = ric.offset() + stride * first;
        let delta = base - at.offset;
        let mut array_offset = delta - delta.rem_euclid(stride);

        // Clamp the accessed span into the a-loc; whatever is cut off was
        // an out-of-bounds access.
        if array_offset < 0 {
            overflow = true;
            accessed += array_offset / stride;
            array_offset = 0;
        }

        if accessed >= 1 && array_offset + accessed * stride > at.size {
            overflow = true;
            accessed = (at.size - array_offset).div_euclid(stride);
        }

        if accessed < 1 {
            // No complete element lands inside the a-loc.
            let mut out = AsiType::int(at.size);
            out.set_buffer_overflow(true);
            return Ok(out);
        }

        let mut fields = Vec::new();
        if array_offset > 0 {
            fields.push(AsiType::int(array_offset));
        }
        fields.push(AsiType::array(element, accessed));
        let rest = at.size - array_offset - accessed * stride;
        if rest > 0 {
            fields.push(AsiType::int(rest));
        }

        let mut out = AsiType::struct_of(fields);
        if overflow {
            out.set_buffer_overflow(true);
        }
        Ok(out)
    }

    /// The three-way split: `offset` leading bytes, the `size` accessed
    /// bytes, and the trailing remainder, with empty pieces omitted.
    fn carve(offset: i64, size: i64, total: i64) -> AsiType {
        let mut fields = Vec::new();
        if offset > 0 {
            fields.push(AsiType::int(offset));
        }
        fields.push(AsiType::int(size));
        let rest = total - offset - size;
        if rest > 0 {
            fields.push(AsiType::int(rest));
        }

        AsiType::struct_of(fields)
    }

    /// Cut a type into a leading `at`-byte piece and the remainder. Arrays
    /// cut only on element boundaries; records are never cut (call sites
    /// split their fields instead).
    pub fn split(ty: &AsiType, at: i64) -> Result<(AsiType, AsiType), AsiError> {
        let size = ty.size();
        if at <= 0 || at >= size {
            return Err(AsiError::InvalidSplit { size, at });
        }

        let (mut first, mut second) = match ty.kind() {
            TypeKind::Int(_) => (AsiType::int(at), AsiType::int(size - at)),
            TypeKind::Impossible(_) => (AsiType::impossible(at), AsiType::impossible(size - at)),
            TypeKind::Array(element, count) => {
                let element_size = element.size();
                if at % element_size != 0 {
                    return Err(AsiError::InvalidSplit { size, at });
                }

                let index = at / element_size;
                (
                    AsiType::array((**element).clone(), index),
                    AsiType::array((**element).clone(), count - index),
                )
            }
            TypeKind::Struct(_) => return Err(AsiError::InvalidSplit { size, at }),
        };

        if ty.buffer_overflow() {
            first.set_buffer_overflow(true);
            second.set_buffer_overflow(true);
        }

        Ok((first, second))
    }

    /// Unify two same-size aggregates into the type satisfying both access
    /// patterns.
    pub fn unify(existing: &AsiType, inferred: &AsiType) -> Result<AsiType, AsiError> {
        if existing.size() != inferred.size() {
            return Err(AsiError::SizeMismatch {
                expected: existing.size(),
                actual: inferred.size(),
            });
        }

        let overflow = existing.buffer_overflow() || inferred.buffer_overflow();

        let mut unified = match (existing.kind(), inferred.kind()) {
            // A recorded contradiction swallows any further constraint.
            (TypeKind::Impossible(_), _) | (_, TypeKind::Impossible(_)) => {
                AsiType::impossible(existing.size())
            }
            // An opaque scalar carries no structure; the other side wins.
            (TypeKind::Int(_), _) => inferred.clone(),
            (_, TypeKind::Int(_)) => existing.clone(),
            (TypeKind::Array(lhs, lhs_count), TypeKind::Array(rhs, rhs_count)) => {
                Self::unify_arrays(lhs, *lhs_count, rhs, *rhs_count)?
            }
            _ => Self::unify_structs(Self::fields_of(existing), Self::fields_of(inferred))?,
        };

        if overflow {
            unified.set_buffer_overflow(true);
        }

        Ok(unified)
    }

    /// Unify two arrays of equal total size by repackaging both to the lcm
    /// of their element sizes and unifying the repackaged elements.
    fn unify_arrays(
        lhs_element: &AsiType,
        lhs_count: i64,
        rhs_element: &AsiType,
        rhs_count: i64,
    ) -> Result<AsiType, AsiError> {
        debug_assert_eq!(
            lhs_element.size() * lhs_count,
            rhs_element.size() * rhs_count
        );

        let total = lhs_element.size() * lhs_count;
        let chunk = lcm(lhs_element.size(), rhs_element.size());

        let lhs_chunk = Self::repackage(lhs_element, chunk / lhs_element.size());
        let rhs_chunk = Self::repackage(rhs_element, chunk / rhs_element.size());

        let unified = Self::unify(&lhs_chunk, &rhs_chunk)?;
        Ok(AsiType::array(unified, total / chunk))
    }

    fn repackage(element: &AsiType, copies: i64) -> AsiType {
        if copies == 1 {
            element.clone()
        } else {
            AsiType::struct_of((0..copies).map(|_| element.clone()).collect())
        }
    }

    /// The classical merge: walk both field queues in step, splitting the
    /// larger head at the smaller head's boundary, and unify the matched
    /// pieces. Both sides must cover the same number of bytes.
    fn unify_structs(lhs: Vec<AsiType>, rhs: Vec<AsiType>) -> Result<AsiType, AsiError> {
        let lhs_size: i64 = lhs.iter().map(AsiType::size).sum();
        let rhs_size: i64 = rhs.iter().map(AsiType::size).sum();
        if lhs_size != rhs_size {
            return Err(AsiError::SizeMismatch {
                expected: lhs_size,
                actual: rhs_size,
            });
        }

        let mut lhs: VecDeque<AsiType> = lhs.into();
        let mut rhs: VecDeque<AsiType> = rhs.into();
        let mut fields = Vec::new();

        while let Some(left) = lhs.pop_front() {
            let Some(right) = rhs.pop_front() else {
                return Err(AsiError::SizeMismatch {
                    expected: lhs_size,
                    actual: rhs_size,
                });
            };

            let unified = match left.size().cmp(&right.size()) {
                Ordering::Equal => Self::unify(&left, &right)?,
                Ordering::Greater => {
                    let (head, tail) = Self::split(&left, right.size())?;
                    lhs.push_front(tail);
                    Self::unify(&head, &right)?
                }
                Ordering::Less => {
                    let (head, tail) = Self::split(&right, left.size())?;
                    rhs.push_front(tail);
                    Self::unify(&left, &head)?
                }
            };

            Self::push_fields(&mut fields, unified);
        }

        Ok(Self::pack_fields(fields))
    }

    /// A type's fields, viewing a non-record as a one-field record.
    fn fields_of(ty: &AsiType) -> Vec<AsiType> {
        match ty.kind() {
            TypeKind::Struct(fields) => fields.clone(),
            _ => vec![ty.clone()],
        }
    }

    /// Append a unified piece, splicing nested records inline so the result
    /// stays flat. Spliced fields inherit the record's diagnostic.
    fn push_fields(fields: &mut Vec<AsiType>, unified: AsiType) {
        if matches!(unified.kind(), TypeKind::Struct(_)) {
            let overflow = unified.buffer_overflow();
            if let TypeKind::Struct(children) = unified.into_kind() {
                for mut child in children {
                    if overflow {
                        child.set_buffer_overflow(true);
                    }
                    fields.push(child);
                }
            }
        } else {
            fields.push(unified);
        }
    }

    /// A run of identical fields is an array, not a record with repeated
    /// members; anything else stays a record.
    fn pack_fields(fields: Vec<AsiType>) -> AsiType {
        if fields.len() >= 2 && fields.iter().all_equal() {
            let overflow = fields.iter().any(AsiType::buffer_overflow);
            let count = fields.len() as i64;

            let mut fields = fields;
            let mut packed = AsiType::array(fields.remove(0), count);
            if overflow {
                packed.set_buffer_overflow(true);
            }
            return packed;
        }

        AsiType::struct_of(fields)
    }

    /// Replay every access against the map: find the touched a-locs, merge
    /// them, and unify their combined type with the access's inferred one.
    /// An access either applies all of its edits or none of them.
    pub fn analyse(&mut self) -> Result<(), AsiError> {
        let accesses = self.accesses.clone();

        for (id, access) in &accesses {
            if access.address.is_empty() {
                trace!("access {id}: undefined address, skipped");
                continue;
            }

            let found = self.find_alocs(&access.address);
            let mut edits = Vec::with_capacity(found.len());

            for (region, mut hits) in found {
                hits.sort_unstable_by_key(|aloc| (aloc.offset, aloc.size));

                let existing = self.existing_memory(&hits)?;
                let merged = ALoc::new(region, hits[0].offset, existing.size());

                let inferred = Self::infer(&access.address, access.size, merged)?;
                let unified = Self::unify(&existing, &inferred)?;

                debug!(
                    "access {id}: {} a-loc(s) in region {region} remapped to {merged}: {unified}",
                    hits.len()
                );

                edits.push((hits, merged, unified));
            }

            for (removed, merged, unified) in edits {
                for aloc in removed {
                    self.types.remove(&aloc);
                }
                self.types.insert(merged, unified);
            }
        }

        self.simplify_types();
        Ok(())
    }

    /// The combined type of a sorted run of touched a-locs: one a-loc's
    /// type as-is, several concatenated into a record with one child per
    /// hit, whatever shape each hit's type has. Keeping a record-typed hit
    /// whole lets unification split the other side at the hit's boundary
    /// instead of at its innermost field.
    fn existing_memory(&self, hits: &[ALoc]) -> Result<AsiType, AsiError> {
        let mut fields = Vec::with_capacity(hits.len());

        for hit in hits {
            if let Some(ty) = self.types.get(hit) {
                if ty.size() != hit.size {
                    return Err(AsiError::SizeMismatch {
                        expected: hit.size,
                        actual: ty.size(),
                    });
                }

                if hits.len() == 1 {
                    return Ok(ty.clone());
                }

                fields.push(ty.clone());
            }
        }

        Ok(AsiType::struct_of(fields))
    }

    /// Fan every top-level record back out into one a-loc per field, at
    /// consecutive offsets. Idempotent: fields of a canonical record are
    /// never records themselves.
    pub fn simplify_types(&mut self) {
        let previous = std::mem::take(&mut self.types);

        for (aloc, ty) in previous {
            let overflow = ty.buffer_overflow();
            match ty.into_kind() {
                TypeKind::Struct(fields) => {
                    let mut offset = aloc.offset;
                    for mut field in fields {
                        if overflow {
                            field.set_buffer_overflow(true);
                        }

                        let size = field.size();
                        self.types.insert(ALoc::new(aloc.region, offset, size), field);
                        offset += size;
                    }
                }
                kind => {
                    self.types
                        .insert(aloc, AsiType::from_parts(kind, overflow));
                }
            }
        }
    }
}

/// Recover the aggregate structure of `a_locs` implied by `accesses`,
/// producing the refined a-loc → type map.
pub fn analyse(
    a_locs: impl IntoIterator<Item = ALoc>,
    accesses: BTreeMap<AccessId, Access>,
) -> Result<BTreeMap<ALoc, AsiType>, AsiError> {
    let mut asi = Asi::new(a_locs, accesses)?;
    asi.analyse()?;
    Ok(asi.into_types())
}
