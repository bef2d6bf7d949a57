/*
Copyright (c) 2022 VMware, Inc.
SPDX-License-Identifier: MIT
Permission is hereby granted, free of charge, to any person obtaining a copy
of this software and associated documentation files (the "Software"), to deal
in the Software without restriction, including without limitation the rights
to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
copies of the Software, and to permit persons to whom the Software is
furnished to do so, subject to the following conditions:
The above copyright notice and this permission notice shall be included in all
copies or substantial portions of the Software.
THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
SOFTWARE.
*/

//! Compiles network-function intents for the fabric-tna pipeline into
//! table entries, clone groups and meter programs.
//!
//! Two independent compilers live here:
//!
//! - [`int::IntProgrammable`] turns INT postcard objectives and a device's
//!   INT configuration into watchlist, report and mirror entries, on top of
//!   the per-pipe mirror topology installed by [`int::TopologyInstaller`].
//!
//! - [`upf::UpfTranslator`] maps UPF entities (interfaces, sessions,
//!   terminations, applications, tunnel peers, meters) to table entries and
//!   back.
//!
//! Both check their inputs against a [`p4ext::Switch`] describing the
//! loaded pipeline, usually [`schema::builtin`].

pub mod backend;
pub mod config;
pub mod context;
pub mod entry;
pub mod error;
pub mod int;
pub mod net;
pub mod schema;
pub mod upf;

pub use error::{Error, ErrorKind, Result};
