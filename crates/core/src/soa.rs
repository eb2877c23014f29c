//! Structure-of-arrays table with stable row handles.
//!
//! A [`Table`] stores each field of its rows in a separate contiguous column
//! (`Vec`). Rows are addressed through a [`RowId`] that stays valid while the
//! row lives, even though erasing a row moves the last physical row into the
//! freed slot. Erased handles are recycled by the next insertion.

use std::fmt;

/// Opaque handle to a logical row of a [`Table`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RowId(u32);

impl RowId {
    pub const fn value(self) -> u32 {
        self.0
    }

    const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "row#{}", self.0)
    }
}

const INVALID_OFFSET: u32 = u32::MAX;

/// Column storage of a [`Table`]. Implemented for tuples of `Vec`s, one `Vec`
/// per column.
pub trait Columns: Default {
    /// A full row, by value.
    type Row;
    /// Shared references to every field of one row.
    type Ref<'a>
    where
        Self: 'a;
    /// Exclusive references to every field of one row.
    type Mut<'a>
    where
        Self: 'a;
    /// Every column as a shared slice.
    type Slices<'a>
    where
        Self: 'a;
    /// Every column as an exclusive slice.
    type SlicesMut<'a>
    where
        Self: 'a;

    fn reserve(&mut self, additional: usize);
    fn push(&mut self, row: Self::Row);
    fn swap_remove(&mut self, offset: usize) -> Self::Row;
    fn get(&self, offset: usize) -> Self::Ref<'_>;
    fn get_mut(&mut self, offset: usize) -> Self::Mut<'_>;
    fn slices(&self) -> Self::Slices<'_>;
    fn slices_mut(&mut self) -> Self::SlicesMut<'_>;
    fn clear(&mut self);
}

macro_rules! impl_columns {
    ($($name:ident : $idx:tt),+) => {
        impl<$($name),+> Columns for ($(Vec<$name>,)+) {
            type Row = ($($name,)+);
            type Ref<'a> = ($(&'a $name,)+) where Self: 'a;
            type Mut<'a> = ($(&'a mut $name,)+) where Self: 'a;
            type Slices<'a> = ($(&'a [$name],)+) where Self: 'a;
            type SlicesMut<'a> = ($(&'a mut [$name],)+) where Self: 'a;

            fn reserve(&mut self, additional: usize) {
                $(self.$idx.reserve(additional);)+
            }

            fn push(&mut self, row: Self::Row) {
                $(self.$idx.push(row.$idx);)+
            }

            fn swap_remove(&mut self, offset: usize) -> Self::Row {
                ($(self.$idx.swap_remove(offset),)+)
            }

            fn get(&self, offset: usize) -> Self::Ref<'_> {
                ($(&self.$idx[offset],)+)
            }

            fn get_mut(&mut self, offset: usize) -> Self::Mut<'_> {
                ($(&mut self.$idx[offset],)+)
            }

            fn slices(&self) -> Self::Slices<'_> {
                ($(self.$idx.as_slice(),)+)
            }

            fn slices_mut(&mut self) -> Self::SlicesMut<'_> {
                ($(self.$idx.as_mut_slice(),)+)
            }

            fn clear(&mut self) {
                $(self.$idx.clear();)+
            }
        }
    };
}

impl_columns!(A: 0);
impl_columns!(A: 0, B: 1);
impl_columns!(A: 0, B: 1, C: 2);
impl_columns!(A: 0, B: 1, C: 2, D: 3);
impl_columns!(A: 0, B: 1, C: 2, D: 3, E: 4);
impl_columns!(A: 0, B: 1, C: 2, D: 3, E: 4, F: 5);

/// Columnar table of rows addressed by stable [`RowId`]s.
///
/// Insertion is amortized O(1) and erasure is O(1): the last physical row is
/// swapped into the erased offset and the handle↔offset maps are patched.
/// Physical order is therefore not insertion order.
pub struct Table<C: Columns> {
    columns: C,
    /// Indexed by row id; [`INVALID_OFFSET`] for erased ids.
    row_to_offset: Vec<u32>,
    /// Indexed by physical offset.
    offset_to_row: Vec<RowId>,
    free_list: Vec<RowId>,
}

impl<C: Columns> Default for Table<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Columns> Table<C> {
    pub fn new() -> Self {
        Self {
            columns: C::default(),
            row_to_offset: Vec::new(),
            offset_to_row: Vec::new(),
            free_list: Vec::new(),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let mut table = Self::new();
        table.reserve(capacity);
        table
    }

    pub fn reserve(&mut self, additional: usize) {
        self.columns.reserve(additional);
        self.row_to_offset.reserve(additional);
        self.offset_to_row.reserve(additional);
        self.free_list.reserve(additional);
    }

    /// Number of live rows.
    pub fn len(&self) -> usize {
        self.offset_to_row.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offset_to_row.is_empty()
    }

    pub fn insert(&mut self, row: C::Row) -> RowId {
        let offset = self.offset_to_row.len() as u32;
        let id = match self.free_list.pop() {
            Some(id) => {
                self.row_to_offset[id.index()] = offset;
                id
            }
            None => {
                let id = RowId(self.row_to_offset.len() as u32);
                self.row_to_offset.push(offset);
                id
            }
        };
        self.columns.push(row);
        self.offset_to_row.push(id);
        id
    }

    /// Erases the row, returning `false` if the handle is not live.
    pub fn erase(&mut self, id: RowId) -> bool {
        self.take(id).is_some()
    }

    /// Erases the row and hands back its fields.
    pub fn take(&mut self, id: RowId) -> Option<C::Row> {
        let offset = self.offset_of(id)?;
        let last = self.offset_to_row.len() - 1;
        let row = self.columns.swap_remove(offset);
        self.offset_to_row.swap_remove(offset);
        if offset != last {
            let moved = self.offset_to_row[offset];
            self.row_to_offset[moved.index()] = offset as u32;
        }
        self.row_to_offset[id.index()] = INVALID_OFFSET;
        self.free_list.push(id);
        Some(row)
    }

    pub fn has_row_id(&self, id: RowId) -> bool {
        self.offset_of(id).is_some()
    }

    pub fn row(&self, id: RowId) -> Option<C::Ref<'_>> {
        let offset = self.offset_of(id)?;
        Some(self.columns.get(offset))
    }

    pub fn row_mut(&mut self, id: RowId) -> Option<C::Mut<'_>> {
        let offset = self.offset_of(id)?;
        Some(self.columns.get_mut(offset))
    }

    /// Row access for handles known to be live.
    ///
    /// # Panics
    /// If `id` was erased or never inserted.
    pub fn at(&self, id: RowId) -> C::Ref<'_> {
        match self.offset_of(id) {
            Some(offset) => self.columns.get(offset),
            None => panic!("{id} is not a live row"),
        }
    }

    /// Mutable counterpart of [`Table::at`].
    ///
    /// # Panics
    /// If `id` was erased or never inserted.
    pub fn at_mut(&mut self, id: RowId) -> C::Mut<'_> {
        match self.offset_of(id) {
            Some(offset) => self.columns.get_mut(offset),
            None => panic!("{id} is not a live row"),
        }
    }

    /// All columns in physical order. The n-th element of every slice belongs
    /// to the row returned by the n-th item of [`Table::row_ids`].
    pub fn columns(&self) -> C::Slices<'_> {
        self.columns.slices()
    }

    pub fn columns_mut(&mut self) -> C::SlicesMut<'_> {
        self.columns.slices_mut()
    }

    /// Live handles in physical order.
    pub fn row_ids(&self) -> impl Iterator<Item = RowId> + '_ {
        self.offset_to_row.iter().copied()
    }

    pub fn clear(&mut self) {
        self.columns.clear();
        self.offset_to_row.clear();
        self.free_list.clear();
        self.row_to_offset.clear();
    }

    fn offset_of(&self, id: RowId) -> Option<usize> {
        match self.row_to_offset.get(id.index()) {
            Some(&offset) if offset != INVALID_OFFSET => Some(offset as usize),
            _ => None,
        }
    }
}

impl<C: Columns> fmt::Debug for Table<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Table")
            .field("len", &self.len())
            .field("free", &self.free_list.len())
            .finish()
    }
}
