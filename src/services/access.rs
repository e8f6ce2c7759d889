//! Decides whether an actor may invoke a saved request template.

use crate::stores::TemplateStore;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};
use uuid::Uuid;

#[async_trait]
pub trait AccessPolicy: Send + Sync {
    async fn may_invoke(&self, actor: &str, template_id: Uuid) -> bool;
}

/// Grants every actor access; used when no directory is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

#[async_trait]
impl AccessPolicy for AllowAll {
    async fn may_invoke(&self, _actor: &str, _template_id: Uuid) -> bool {
        true
    }
}

#[derive(Debug, Clone, Default)]
struct Project {
    owner: String,
    teams: HashSet<String>,
}

#[derive(Debug, Default)]
struct Directory {
    projects: HashMap<String, Project>,
    team_members: HashMap<String, HashSet<String>>,
    collection_projects: HashMap<String, String>,
}

/// Ownership rule: an actor may invoke a template when they own the
/// template's project or belong to a team the project is shared with.
/// Unknown templates, collections and projects deny.
#[derive(Clone)]
pub struct OwnershipPolicy {
    templates: Arc<dyn TemplateStore>,
    directory: Arc<RwLock<Directory>>,
}

impl OwnershipPolicy {
    pub fn new(templates: Arc<dyn TemplateStore>) -> Self {
        Self {
            templates,
            directory: Arc::new(RwLock::new(Directory::default())),
        }
    }

    pub fn add_project(&self, project_id: &str, owner: &str) {
        if let Ok(mut dir) = self.directory.write() {
            dir.projects.insert(
                project_id.to_string(),
                Project {
                    owner: owner.to_string(),
                    teams: HashSet::new(),
                },
            );
        }
    }

    pub fn share_with_team(&self, project_id: &str, team_id: &str) {
        if let Ok(mut dir) = self.directory.write() {
            if let Some(project) = dir.projects.get_mut(project_id) {
                project.teams.insert(team_id.to_string());
            }
        }
    }

    pub fn add_team_member(&self, team_id: &str, actor: &str) {
        if let Ok(mut dir) = self.directory.write() {
            dir.team_members
                .entry(team_id.to_string())
                .or_default()
                .insert(actor.to_string());
        }
    }

    pub fn assign_collection(&self, collection_id: &str, project_id: &str) {
        if let Ok(mut dir) = self.directory.write() {
            dir.collection_projects
                .insert(collection_id.to_string(), project_id.to_string());
        }
    }

    fn allows(&self, actor: &str, collection_id: &str) -> bool {
        let Ok(dir) = self.directory.read() else {
            return false;
        };
        let Some(project) = dir
            .collection_projects
            .get(collection_id)
            .and_then(|project_id| dir.projects.get(project_id))
        else {
            return false;
        };
        if project.owner == actor {
            return true;
        }
        project.teams.iter().any(|team| {
            dir.team_members
                .get(team)
                .map(|members| members.contains(actor))
                .unwrap_or(false)
        })
    }
}

#[async_trait]
impl AccessPolicy for OwnershipPolicy {
    async fn may_invoke(&self, actor: &str, template_id: Uuid) -> bool {
        match self.templates.get(template_id).await {
            Ok(Some(template)) => self.allows(actor, &template.collection_id),
            _ => false,
        }
    }
}
