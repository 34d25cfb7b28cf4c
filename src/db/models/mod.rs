// SPDX-License-Identifier: MIT

pub mod agent;
pub mod message;
