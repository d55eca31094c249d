use crate::pipeline::Context;
use image::RgbaImage;
use replay_state::{DeploymentSlot, UNKNOWN_DEPLOYMENT};
use replay_vision::{scaled_templates, RosterEntry};
use tracing::{debug, warn};

/// Roster units paired with the tray avatar they were matched to, in roster order.
///
/// Slot names are later resolved against these tray avatars rather than the
/// formation-screen ones, so both sides of the comparison come from the same
/// screen at the same scale.
#[derive(Debug, Clone, Default)]
pub struct AvatarBook {
    entries: Vec<(String, RgbaImage)>,
}

impl AvatarBook {
    /// Match every roster unit against the tray slots of a compatible role,
    /// trying each resize factor the unit's rarity calls for.
    pub fn build(ctx: &Context<'_>, roster: &[RosterEntry], tray: &[DeploymentSlot]) -> Self {
        let config = ctx.config;
        let mut entries = Vec::new();

        for unit in roster {
            let roles = ctx.data.compatible_roles(&unit.name);
            let scales = config
                .avatar_scales
                .for_rarity(ctx.data.rarity(&unit.name));

            let mut templates = Vec::new();
            let mut owners = Vec::new();
            for slot in tray.iter().filter(|s| roles.contains(&s.role)) {
                for templ in scaled_templates(&slot.avatar, &config.avatar_roi, scales) {
                    templates.push(templ);
                    owners.push(slot);
                }
            }

            match ctx.perception.best_template_match(
                &unit.avatar,
                &templates,
                config.deployment_match_threshold,
            ) {
                Some(m) => {
                    let slot = owners[m.index];
                    debug!(
                        "{} matched tray slot {} (score {:.3})",
                        unit.name, slot.index, m.score
                    );
                    entries.push((unit.name.clone(), slot.avatar.clone()));
                }
                None => warn!("Failed to match {} against the deployment tray", unit.name),
            }
        }

        Self { entries }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    /// Best role-compatible match for a slot's avatar, or the unknown sentinel.
    pub fn resolve(&self, ctx: &Context<'_>, slot: &DeploymentSlot) -> String {
        let (names, avatars): (Vec<&str>, Vec<RgbaImage>) = self
            .entries
            .iter()
            .filter(|(name, _)| ctx.data.compatible_roles(name).contains(&slot.role))
            .map(|(name, avatar)| (name.as_str(), avatar.clone()))
            .unzip();

        match ctx.perception.best_template_match(
            &slot.avatar,
            &avatars,
            ctx.config.name_match_threshold,
        ) {
            Some(m) => names[m.index].to_string(),
            None => {
                warn!(
                    "Tray slot {} ({:?}) matched no known unit",
                    slot.index, slot.role
                );
                UNKNOWN_DEPLOYMENT.to_string()
            }
        }
    }

    /// Fill in every unresolved slot name. Already named slots are left alone.
    pub fn resolve_names(&self, ctx: &Context<'_>, slots: &mut [DeploymentSlot]) {
        for slot in slots.iter_mut().filter(|s| s.name.is_none()) {
            slot.name = Some(self.resolve(ctx, slot));
        }
    }
}
