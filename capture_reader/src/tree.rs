// Display-tree materialization: copies the index-based forest into the
// node arena consumed by the presentation layer. Breadth-first with an
// explicit FIFO queue, never recursion: pathologically deep
// instrumentation (recursive functions profiled thousands of levels
// deep) must not become native stack growth.

use std::collections::VecDeque;

use crate::forest::BlockIndex;
use crate::reader::LoadedCapture;

/// Arena handle for display nodes.
pub type NodeIndex = usize;

/// One presentation node: either a thread header or a block row.
#[derive(Debug, Clone)]
pub struct DisplayNode {
    pub name: String,
    pub thread_id: u64,
    pub begin_time: u64,
    pub end_time: u64,
    /// Backing block, absent for thread-header nodes.
    pub block_index: Option<BlockIndex>,
    pub descriptor_id: Option<u32>,
    pub children: Vec<NodeIndex>,
}

/// Node arena plus the per-thread root nodes, in thread-id order.
#[derive(Debug, Default)]
pub struct DisplayTree {
    pub nodes: Vec<DisplayNode>,
    pub roots: Vec<NodeIndex>,
}

impl DisplayTree {
    pub fn node(&self, index: NodeIndex) -> &DisplayNode {
        &self.nodes[index]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Build the display tree for a loaded capture.
pub fn build_display_tree(capture: &LoadedCapture) -> DisplayTree {
    let mut tree = DisplayTree::default();
    let blocks = capture.blocks();

    let mut queue: VecDeque<(BlockIndex, NodeIndex)> = VecDeque::new();

    for root in capture.threads().values() {
        let label = match capture.thread_name(root.thread_id) {
            Some(name) => format!("{name} ({})", root.thread_id),
            None => format!("Thread {}", root.thread_id),
        };
        let root_node = tree.nodes.len();
        tree.nodes.push(DisplayNode {
            name: label,
            thread_id: root.thread_id,
            begin_time: root.begin_time,
            end_time: root.end_time,
            block_index: None,
            descriptor_id: None,
            children: Vec::new(),
        });
        tree.roots.push(root_node);

        for &child in &root.children {
            queue.push_back((child, root_node));
        }
    }

    while let Some((block_index, parent_node)) = queue.pop_front() {
        let block = &blocks[block_index as usize];

        // Instance name wins over the descriptor name; an unnamed
        // descriptor shows as its type label.
        let name = if !block.name.is_empty() {
            capture.string(block.name).to_owned()
        } else {
            capture.descriptor_name(block.descriptor_id).to_owned()
        };

        let node_index = tree.nodes.len();
        tree.nodes.push(DisplayNode {
            name,
            thread_id: block.thread_id,
            begin_time: block.begin_time,
            end_time: block.end_time,
            block_index: Some(block_index),
            descriptor_id: Some(block.descriptor_id),
            children: Vec::new(),
        });
        tree.nodes[parent_node].children.push(node_index);

        for &child in &block.children {
            queue.push_back((child, node_index));
        }
    }

    tree
}
