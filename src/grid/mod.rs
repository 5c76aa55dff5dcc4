/// Toroidal panning grid
///
/// A fixed cube of cells that follows a moving window over an infinite integer
/// lattice. Panning rotates the storage origin instead of moving data, and only the
/// slabs of cells that leave the window are disposed.

use glam::IVec3;
use std::ops::Range;

use crate::constants::layout::MAX_GRID_CHUNKS;
use crate::error::{capacity_error, TerrainError, TerrainResult};

/// Physical slot of `pos` for a window at `corner` whose storage is rotated by `origin`
pub fn local_index(pos: IVec3, corner: IVec3, origin: IVec3, side: u32) -> IVec3 {
    (pos - corner + origin).rem_euclid(IVec3::splat(side as i32))
}

#[derive(Debug)]
struct Slot<T> {
    pos: IVec3,
    value: T,
}

#[derive(Debug)]
pub struct PanningGrid<T> {
    side: u32,
    corner: IVec3,
    origin: IVec3,
    slots: Vec<Option<Slot<T>>>,
}

impl<T> PanningGrid<T> {
    /// Empty window of `side` cells per axis with its minimum cell at `corner`
    pub fn new(side: u32, corner: IVec3) -> TerrainResult<Self> {
        if side > MAX_GRID_CHUNKS {
            return Err(capacity_error(
                "panning grid side",
                side as usize,
                MAX_GRID_CHUNKS as usize,
            ));
        }
        let side = side.max(1);
        let edge = side as usize;
        let len = edge * edge * edge;
        Ok(Self {
            side,
            corner,
            origin: IVec3::ZERO,
            slots: (0..len).map(|_| None).collect(),
        })
    }

    pub fn side(&self) -> u32 {
        self.side
    }

    /// Minimum cell of the window
    pub fn corner(&self) -> IVec3 {
        self.corner
    }

    pub fn contains(&self, pos: IVec3) -> bool {
        let rel = pos - self.corner;
        rel.cmpge(IVec3::ZERO).all() && rel.cmplt(IVec3::splat(self.side as i32)).all()
    }

    /// Number of occupied cells
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    pub fn get(&self, pos: IVec3) -> TerrainResult<Option<&T>> {
        let index = self.slot_index(pos)?;
        Ok(self.slots[index]
            .as_ref()
            .filter(|slot| slot.pos == pos)
            .map(|slot| &slot.value))
    }

    pub fn get_mut(&mut self, pos: IVec3) -> TerrainResult<Option<&mut T>> {
        let index = self.slot_index(pos)?;
        Ok(self.slots[index]
            .as_mut()
            .filter(|slot| slot.pos == pos)
            .map(|slot| &mut slot.value))
    }

    /// The cell at `pos`, computing it with `calculate` if it is empty
    pub fn get_or_compute(
        &mut self,
        pos: IVec3,
        calculate: impl FnOnce(IVec3) -> T,
    ) -> TerrainResult<&mut T> {
        let index = self.slot_index(pos)?;
        let slot = &mut self.slots[index];
        if slot.as_ref().map_or(true, |s| s.pos != pos) {
            *slot = Some(Slot {
                pos,
                value: calculate(pos),
            });
        }
        match slot {
            Some(slot) => Ok(&mut slot.value),
            None => Err(out_of_window(pos)),
        }
    }

    /// Move the window to `corner`, handing every cell that leaves it to `dispose`.
    ///
    /// Returns the number of disposed cells.
    pub fn set_focus(&mut self, corner: IVec3, mut dispose: impl FnMut(IVec3, T)) -> usize {
        let delta = corner - self.corner;
        if delta == IVec3::ZERO {
            return 0;
        }

        let side = self.side as i32;
        if delta.abs().max_element() >= side {
            let disposed = self.clear(&mut dispose);
            self.corner = corner;
            self.origin = (self.origin + delta).rem_euclid(IVec3::splat(side));
            return disposed;
        }

        let old = self.corner;
        let mut disposed = 0;
        // Slab per axis: cells outside the new range on that axis but inside it on
        // every earlier axis, so no cell is visited twice
        for axis in 0..3 {
            let mut ranges: [Range<i32>; 3] = [
                old.x..old.x + side,
                old.y..old.y + side,
                old.z..old.z + side,
            ];
            for earlier in 0..axis {
                ranges[earlier] = overlap(old[earlier], corner[earlier], side);
            }
            ranges[axis] = leaving(old[axis], corner[axis], side);

            for z in ranges[2].clone() {
                for y in ranges[1].clone() {
                    for x in ranges[0].clone() {
                        let pos = IVec3::new(x, y, z);
                        let index = self.index_of(local_index(pos, old, self.origin, self.side));
                        if let Some(slot) = self.slots[index].take() {
                            if slot.pos == pos {
                                dispose(pos, slot.value);
                                disposed += 1;
                            } else {
                                self.slots[index] = Some(slot);
                            }
                        }
                    }
                }
            }
        }

        self.corner = corner;
        self.origin = (self.origin + delta).rem_euclid(IVec3::splat(side));
        disposed
    }

    /// Dispose every cell
    pub fn clear(&mut self, mut dispose: impl FnMut(IVec3, T)) -> usize {
        let mut disposed = 0;
        for slot in self.slots.iter_mut() {
            if let Some(slot) = slot.take() {
                dispose(slot.pos, slot.value);
                disposed += 1;
            }
        }
        disposed
    }

    pub fn iter(&self) -> impl Iterator<Item = (IVec3, &T)> {
        self.slots
            .iter()
            .flatten()
            .map(|slot| (slot.pos, &slot.value))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (IVec3, &mut T)> {
        self.slots
            .iter_mut()
            .flatten()
            .map(|slot| (slot.pos, &mut slot.value))
    }

    /// Every position of the window, occupied or not
    pub fn positions(&self) -> impl Iterator<Item = IVec3> {
        let corner = self.corner;
        let side = self.side as i32;
        (0..side).flat_map(move |z| {
            (0..side).flat_map(move |y| (0..side).map(move |x| corner + IVec3::new(x, y, z)))
        })
    }

    fn slot_index(&self, pos: IVec3) -> TerrainResult<usize> {
        if !self.contains(pos) {
            return Err(out_of_window(pos));
        }
        Ok(self.index_of(local_index(pos, self.corner, self.origin, self.side)))
    }

    fn index_of(&self, local: IVec3) -> usize {
        let side = self.side as usize;
        local.x as usize + side * (local.y as usize + side * local.z as usize)
    }
}

fn out_of_window(pos: IVec3) -> TerrainError {
    TerrainError::OutOfWindow {
        x: pos.x,
        y: pos.y,
        z: pos.z,
    }
}

/// Part of `[old, old + side)` outside `[new, new + side)`
fn leaving(old: i32, new: i32, side: i32) -> Range<i32> {
    if new > old {
        old..new.min(old + side)
    } else {
        (new + side).max(old)..old + side
    }
}

/// Part of `[old, old + side)` inside `[new, new + side)`
fn overlap(old: i32, new: i32, side: i32) -> Range<i32> {
    old.max(new)..(old + side).min(new + side)
}
