// SPDX-License-Identifier: MIT

//! Agent development kit: the language model contract and its clients.

pub mod error;
pub mod model;
