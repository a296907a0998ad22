//! `@PG` program records for exported SAM headers.
//!
//! A header read from an earlier tool may already carry `@PG` records, possibly one
//! written by a previous `mgtranscode` run. The record added here gets an ID that is
//! unique within the header (`mgtranscode`, `mgtranscode.1`, ...) and points its `PP`
//! tag at the last program of the existing chain.

use anyhow::Result;
use bstr::BString;
use noodles::sam::Header;
use noodles::sam::header::record::value::Map;
use noodles::sam::header::record::value::map::Program;
use noodles::sam::header::record::value::map::program::tag;
use std::collections::HashSet;

/// Program name and base `@PG` ID.
pub const PROGRAM_NAME: &str = "mgtranscode";

/// ID of the last program in the `@PG` chain: the one no other program names as `PP`.
#[must_use]
pub fn last_program_id(header: &Header) -> Option<String> {
    let programs = header.programs();
    let program_map = programs.as_ref();

    let referenced: HashSet<&[u8]> = program_map
        .values()
        .filter_map(|pg| pg.other_fields().get(&tag::PREVIOUS_PROGRAM_ID))
        .map(|pp| pp.as_slice())
        .collect();

    program_map
        .keys()
        .find(|id| !referenced.contains(id.as_slice()))
        .or_else(|| program_map.keys().next())
        .map(ToString::to_string)
}

/// `base_id`, or `base_id` with the first free `.N` suffix if the header already uses it.
#[must_use]
pub fn unique_program_id(header: &Header, base_id: &str) -> String {
    let programs = header.programs();
    let program_map = programs.as_ref();

    if !program_map.contains_key(base_id.as_bytes()) {
        return base_id.to_string();
    }
    (1..)
        .map(|i| format!("{base_id}.{i}"))
        .find(|candidate| !program_map.contains_key(candidate.as_bytes()))
        .unwrap_or_else(|| base_id.to_string())
}

/// Build the `@PG` record of this program.
pub fn build_program_record(
    version: &str,
    command_line: &str,
    previous_program: Option<&str>,
) -> Result<Map<Program>> {
    let mut builder = Map::<Program>::builder()
        .insert(tag::NAME, PROGRAM_NAME)
        .insert(tag::VERSION, version)
        .insert(tag::COMMAND_LINE, command_line);

    if let Some(pp) = previous_program {
        builder = builder.insert(tag::PREVIOUS_PROGRAM_ID, pp);
    }

    Ok(builder.build()?)
}

/// Append this program's `@PG` record to `header`, chained after its last program.
pub fn add_program_record(mut header: Header, version: &str, command_line: &str) -> Result<Header> {
    let previous_program = last_program_id(&header);
    let id = unique_program_id(&header, PROGRAM_NAME);
    let record = build_program_record(version, command_line, previous_program.as_deref())?;

    header.programs_mut().add(BString::from(id), record)?;
    Ok(header)
}
