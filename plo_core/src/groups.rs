use crate::config::PloConfig;
use crate::error::PloError;
use crate::fundamental::ProjectorGroup;

/// Merge the driver configuration into the raw groups: claim the configured
/// `(site, l)` combinations for the correlated subspace, attach their shell
/// labels, and materialise every group's transformation.
///
/// Groups the configuration does not claim keep their full shell, whose
/// transformation is the identity.
pub fn resolve_groups(
    cfg: &PloConfig,
    mut groups: Vec<ProjectorGroup>,
) -> Result<Vec<ProjectorGroup>, PloError> {
    cfg.validate()?;
    let sites = cfg.site_indices()?;
    for group in &mut groups {
        if group.orbitals.len() != 2 * group.l + 1 {
            return Err(PloError::ShapeMismatch(format!(
                "group at site {} with l = {} holds {} projector(s) instead of {}",
                group.site,
                group.l,
                group.orbitals.len(),
                2 * group.l + 1
            )));
        }
        for (&site, &shell) in sites.iter().zip(cfg.shell.iter()) {
            if site == group.site && shell.l() == group.l {
                group.corr = true;
                group.shell = shell;
            }
        }
        group.transform = group.shell.transform();
    }
    Ok(groups)
}

#[cfg(test)]
mod test {
    use crate::config::PloConfig;
    use crate::fundamental::{ProjectorGroup, Shell};

    use super::resolve_groups;

    fn raw_groups() -> Vec<ProjectorGroup> {
        vec![
            ProjectorGroup::from_raw(1, 0, vec![0]).unwrap(),
            ProjectorGroup::from_raw(1, 2, (1..6).collect()).unwrap(),
            ProjectorGroup::from_raw(2, 2, (6..11).collect()).unwrap(),
        ]
    }

    #[test]
    fn claims_configured_site_and_shell() {
        let mut cfg = PloConfig::example();
        cfg.atoms = vec!["V : 2".to_string()];
        let groups = resolve_groups(&cfg, raw_groups()).unwrap();

        // untouched groups stay full-shell identity
        assert!(!groups[0].corr);
        assert_eq!(groups[0].shell, Shell::S);
        assert!(!groups[1].corr);
        assert_eq!(groups[1].transform.dim(), (5, 5));

        // the claimed one gets the configured split shell
        assert!(groups[2].corr);
        assert_eq!(groups[2].shell, Shell::DT2g);
        assert_eq!(groups[2].transform.dim(), (3, 5));
    }

    #[test]
    fn shell_l_must_match_group_l() {
        let mut cfg = PloConfig::example();
        cfg.atoms = vec!["V : 1".to_string()];
        cfg.shell = vec![Shell::P];
        // site 1 has s and d groups only; a p claim touches neither
        let groups = resolve_groups(&cfg, raw_groups()).unwrap();
        assert!(groups.iter().all(|g| !g.corr));
    }

    #[test]
    fn corrupt_projector_count_is_fatal() {
        let cfg = PloConfig::example();
        let mut groups = raw_groups();
        groups[1].orbitals.pop();
        assert!(resolve_groups(&cfg, groups).is_err());
    }
}
