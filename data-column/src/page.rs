//! [`Page`] is an aligned collection of columns

use std::fmt::Display;

use snafu::{Snafu, ensure};
use tabled::builder::Builder as TableBuilder;

use crate::block::BlockImpl;

#[allow(missing_docs)]
#[derive(Debug, Snafu)]
#[snafu(display("Channels have different position counts. Blocks: {blocks:?}"))]
pub struct MismatchedPositionCountError {
    blocks: Vec<BlockImpl>,
}

type Result<T> = std::result::Result<T, MismatchedPositionCountError>;

/// [`Page`] is a chunk of rows, the unit driven through operators. Each
/// column is addressed by its integer channel and all of the channels share
/// one position count. Columns never share mutable state
#[derive(Debug)]
pub struct Page {
    blocks: Vec<BlockImpl>,
    /// Number of positions in the page. All of the blocks have this position
    /// count
    position_count: usize,
}

impl Page {
    /// Create a new [`Page`] with all of the blocks sharing one position
    /// count
    pub fn try_new(blocks: Vec<BlockImpl>) -> Result<Self> {
        let mut iter = blocks.iter();
        let Some(position_count) = iter.next().map(|block| block.position_count()) else {
            return Ok(Self {
                blocks,
                position_count: 0,
            });
        };

        ensure!(
            iter.all(|block| block.position_count() == position_count),
            MismatchedPositionCountSnafu { blocks }
        );

        Ok(Self {
            blocks,
            position_count,
        })
    }

    /// Get the number of positions in the page
    #[inline]
    pub fn position_count(&self) -> usize {
        self.position_count
    }

    /// Get the number of channels in the page
    #[inline]
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Get a reference to the block at the given channel
    #[inline]
    pub fn get_block(&self, channel: usize) -> Option<&BlockImpl> {
        self.blocks.get(channel)
    }

    /// Get blocks
    #[inline]
    pub fn blocks(&self) -> &[BlockImpl] {
        &self.blocks
    }

    /// Take the blocks out of the page
    #[inline]
    pub fn into_blocks(self) -> Vec<BlockImpl> {
        self.blocks
    }

    /// Create a new [`Page`] with `block` appended as the last channel, used
    /// to attach derived columns such as group ids to their input rows
    pub fn append_block(self, block: BlockImpl) -> Result<Self> {
        let mut blocks = self.blocks;
        blocks.push(block);
        Self::try_new(blocks)
    }

    /// Format the page with given table builder
    pub fn fmt_table(&self, table_builder: &mut TableBuilder, with_element_type: bool) {
        if with_element_type {
            table_builder.push_record(
                self.blocks
                    .iter()
                    .map(|block| format!("{:?}", block.element_type())),
            );
        }

        (0..self.position_count).for_each(|position| {
            table_builder.push_record(
                self.blocks
                    .iter()
                    .map(|block| block.position_display(position)),
            );
        });
    }
}

impl Display for Page {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut table_builder = TableBuilder::default();
        self.fmt_table(&mut table_builder, true);
        write!(
            f,
            "{}",
            table_builder
                .build()
                .with(tabled::settings::style::Style::modern())
        )
    }
}
