/*!
This crate contains small utilities shared by the other snowcast crates: the error taxonomy, a [`Finite`](finite/struct.Finite.html) float wrapper, an atomic [`ProgressCounter`](progress_counter/struct.ProgressCounter.html), a [`CancellationToken`](cancellation/struct.CancellationToken.html), and a plain text [`Table`](table/struct.Table.html).
*/

#![allow(clippy::tabs_in_doc_comments)]

pub mod cancellation;
pub mod error;
pub mod finite;
pub mod progress_counter;
pub mod table;
