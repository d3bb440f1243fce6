//! Team formation rules
//!
//! A team has exactly one leader (its creator) and grows by invitation or by
//! naming members at creation. Every member shares the leader's department
//! and batch; members named at creation must also share the class section.

use crate::db::StudentProfile;
use crate::{Error, Result};

/// Smallest team allowed to submit a proposal
pub const MIN_TEAM_SIZE: usize = 3;

/// Largest team, leader included
pub const MAX_TEAM_SIZE: usize = 4;

/// Pending invitations a single student may hold
pub const MAX_PENDING_INVITES: i64 = 5;

const MAX_TEAM_NAME_LEN: usize = 100;

/// Normalise and validate a team name
pub fn validate_team_name(name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::InvalidInput("Team name is required.".to_string()));
    }
    if name.chars().count() > MAX_TEAM_NAME_LEN {
        return Err(Error::InvalidInput(format!(
            "Team name cannot exceed {} characters.",
            MAX_TEAM_NAME_LEN
        )));
    }
    Ok(name.to_string())
}

/// Check that `adding` more members fit into a team of `current_size`
pub fn check_capacity(current_size: usize, adding: usize) -> Result<()> {
    if current_size + adding > MAX_TEAM_SIZE {
        return Err(Error::Conflict(format!(
            "Team cannot have more than {} members.",
            MAX_TEAM_SIZE
        )));
    }
    Ok(())
}

/// Check that a team is large enough to submit a proposal
pub fn check_ready_for_proposal(size: usize) -> Result<()> {
    if size < MIN_TEAM_SIZE {
        return Err(Error::Conflict(format!(
            "Team must have at least {} members.",
            MIN_TEAM_SIZE
        )));
    }
    Ok(())
}

/// Validate a member named by the leader at team creation
pub fn check_initial_member(
    leader: &StudentProfile,
    candidate: &StudentProfile,
    candidate_in_team: bool,
) -> Result<()> {
    if candidate.id == leader.id {
        return Err(Error::InvalidInput(
            "You are already the leader of this team.".to_string(),
        ));
    }
    if !leader.same_cohort(candidate) || leader.class_section_id != candidate.class_section_id {
        return Err(Error::InvalidInput(format!(
            "{} is not in your class section.",
            candidate.roll_number
        )));
    }
    if candidate_in_team {
        return Err(Error::Conflict(format!(
            "{} is already part of a team.",
            candidate.roll_number
        )));
    }
    Ok(())
}

/// Facts about the invitation target gathered from storage
#[derive(Debug, Clone, Copy)]
pub struct InviteTarget<'a> {
    pub profile: &'a StudentProfile,
    pub in_team: bool,
    pub pending_invites: i64,
    pub already_invited_by_sender: bool,
}

/// Validate an invitation from a team leader to `target`
pub fn check_invitable(sender: &StudentProfile, target: &InviteTarget<'_>) -> Result<()> {
    if target.profile.id == sender.id {
        return Err(Error::InvalidInput("You cannot invite yourself.".to_string()));
    }
    if !sender.same_cohort(target.profile) {
        return Err(Error::NotFound(
            "Student with that roll was not found in your batch.".to_string(),
        ));
    }
    if target.in_team {
        return Err(Error::Conflict(
            "This student is already part of a team.".to_string(),
        ));
    }
    if target.pending_invites >= MAX_PENDING_INVITES {
        return Err(Error::Conflict(format!(
            "This student already has {} pending invitations.",
            MAX_PENDING_INVITES
        )));
    }
    if target.already_invited_by_sender {
        return Err(Error::Conflict(
            "You already sent an invitation to this student.".to_string(),
        ));
    }
    Ok(())
}
