//! Depth-first frontier for the crawl driver
//!
//! Each fetched page pushes a [`Frame`] holding the elements discovered on it.
//! The driver always works on the top frame, so the first accepted element of
//! a page is fetched, and its own elements processed, before the page's next
//! sibling element is even considered. That order is what lets the parent
//! resolver attribute every page to the page that discovered it.

use std::collections::VecDeque;

use crate::crawler::assembler::Cursor;
use crate::crawler::parser::DiscoveredElement;

/// A fetched page whose elements are still being processed
#[derive(Debug, Clone)]
pub struct Frame {
    /// The page the elements belong to
    pub cursor: Cursor,

    /// Elements not yet handed to the assembler, in document order
    pub elements: VecDeque<DiscoveredElement>,

    /// Page body, kept for e-mail harvesting once all elements are processed
    pub body: String,
}

impl Frame {
    pub fn new(cursor: Cursor, elements: VecDeque<DiscoveredElement>, body: String) -> Self {
        Self {
            cursor,
            elements,
            body,
        }
    }

    /// Takes the next element in document order
    pub fn next_element(&mut self) -> Option<DiscoveredElement> {
        self.elements.pop_front()
    }

    pub fn is_exhausted(&self) -> bool {
        self.elements.is_empty()
    }
}

/// Stack of frames driving a depth-first crawl
#[derive(Debug, Default)]
pub struct Scheduler {
    frames: Vec<Frame>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pushes the frame of a freshly fetched page
    pub fn push(&mut self, frame: Frame) {
        tracing::trace!(
            "Scheduling {} elements at depth {}",
            frame.elements.len(),
            frame.cursor.depth
        );
        self.frames.push(frame);
    }

    pub fn pop(&mut self) -> Option<Frame> {
        self.frames.pop()
    }

    /// The frame currently being processed
    pub fn top_mut(&mut self) -> Option<&mut Frame> {
        self.frames.last_mut()
    }

    /// Number of pages with elements still pending
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Total number of elements waiting across all frames
    pub fn pending_elements(&self) -> usize {
        self.frames.iter().map(|f| f.elements.len()).sum()
    }
}
