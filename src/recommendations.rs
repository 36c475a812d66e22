//! Scenario-linked action recommendations.
//!
//! Maps positive what-if adjustments on the three IVI pillars to a curated
//! catalog of improvement initiatives, scores their combined impact with the
//! same pillar weights as the composite IVI, and groups them into an
//! implementation roadmap.

use std::cmp::Ordering;

use serde::Serialize;

use crate::projection::{EXPERIENCE_WEIGHT, HEALTH_WEIGHT, UTILIZATION_WEIGHT};

/// Which IVI pillar an action item improves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Pillar {
    H,
    E,
    U,
}

/// Relative priority of an action item. Variant order drives sorting:
/// high priority first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

/// A KPI an action item is expected to move.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Kpi {
    pub name: &'static str,
    pub target: &'static str,
}

/// One improvement initiative from the catalog.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionItem {
    pub id: &'static str,
    pub title: &'static str,
    pub description: &'static str,
    pub priority: Priority,
    pub timeline: &'static str,
    /// Expected pillar-score improvement in percentage points.
    pub estimated_impact: f64,
    pub kpis: &'static [Kpi],
    pub category: Pillar,
    /// Minimum pillar adjustment (in percent) that makes this item relevant.
    pub required_adjustment: f64,
}

/// Health (H) pillar initiatives.
pub static HEALTH_RECOMMENDATIONS: &[ActionItem] = &[
    ActionItem {
        id: "h1",
        title: "Launch Preventive Health Programs",
        description: "Implement comprehensive preventive health screenings and wellness \
                      programs for all members. Include annual check-ups, vaccinations, and \
                      health risk assessments.",
        priority: Priority::High,
        timeline: "3-6 months",
        estimated_impact: 15.0,
        kpis: &[
            Kpi { name: "Screening Rate", target: "80%" },
            Kpi { name: "Early Detection Rate", target: "+25%" },
        ],
        category: Pillar::H,
        required_adjustment: 5.0,
    },
    ActionItem {
        id: "h2",
        title: "Chronic Disease Management Program",
        description: "Establish dedicated care coordination for members with chronic \
                      conditions like diabetes, hypertension, and heart disease. Include \
                      regular monitoring, medication adherence support, and lifestyle \
                      coaching.",
        priority: Priority::High,
        timeline: "6-12 months",
        estimated_impact: 20.0,
        kpis: &[
            Kpi { name: "Chronic Condition Control Rate", target: "70%" },
            Kpi { name: "Hospital Readmission Rate", target: "-30%" },
        ],
        category: Pillar::H,
        required_adjustment: 10.0,
    },
    ActionItem {
        id: "h3",
        title: "Mental Health Support Initiative",
        description: "Introduce mental health services including counseling, stress \
                      management workshops, and employee assistance programs. Partner with \
                      mental health providers for comprehensive coverage.",
        priority: Priority::Medium,
        timeline: "3-6 months",
        estimated_impact: 10.0,
        kpis: &[
            Kpi { name: "Mental Health Utilization", target: "+40%" },
            Kpi { name: "Employee Satisfaction", target: "+15%" },
        ],
        category: Pillar::H,
        required_adjustment: 5.0,
    },
    ActionItem {
        id: "h4",
        title: "Nutrition and Fitness Programs",
        description: "Offer nutrition counseling, gym membership subsidies, and corporate \
                      fitness challenges. Include weight management programs and healthy \
                      eating workshops.",
        priority: Priority::Medium,
        timeline: "2-4 months",
        estimated_impact: 8.0,
        kpis: &[
            Kpi { name: "Program Participation", target: "50%" },
            Kpi { name: "BMI Improvement", target: "+10%" },
        ],
        category: Pillar::H,
        required_adjustment: 3.0,
    },
    ActionItem {
        id: "h5",
        title: "Telemedicine Integration",
        description: "Deploy 24/7 telemedicine services for non-emergency consultations. \
                      Enable virtual doctor visits, prescription renewals, and health \
                      monitoring through mobile apps.",
        priority: Priority::High,
        timeline: "1-3 months",
        estimated_impact: 12.0,
        kpis: &[
            Kpi { name: "Telemedicine Adoption", target: "60%" },
            Kpi { name: "ER Visit Reduction", target: "-20%" },
        ],
        category: Pillar::H,
        required_adjustment: 8.0,
    },
];

/// Experience (E) pillar initiatives.
pub static EXPERIENCE_RECOMMENDATIONS: &[ActionItem] = &[
    ActionItem {
        id: "e1",
        title: "Streamline Claims Processing",
        description: "Implement automated claims processing with AI-powered document \
                      verification. Reduce processing time from days to hours with \
                      real-time status updates.",
        priority: Priority::High,
        timeline: "3-6 months",
        estimated_impact: 18.0,
        kpis: &[
            Kpi { name: "Claims Processing Time", target: "<24 hours" },
            Kpi { name: "First-Time Approval Rate", target: "85%" },
        ],
        category: Pillar::E,
        required_adjustment: 10.0,
    },
    ActionItem {
        id: "e2",
        title: "Launch Mobile App with Self-Service",
        description: "Develop a comprehensive mobile app allowing members to view coverage, \
                      submit claims, find providers, and access digital ID cards. Include \
                      appointment booking and prescription tracking.",
        priority: Priority::High,
        timeline: "4-8 months",
        estimated_impact: 15.0,
        kpis: &[
            Kpi { name: "App Adoption Rate", target: "70%" },
            Kpi { name: "Self-Service Usage", target: "60%" },
        ],
        category: Pillar::E,
        required_adjustment: 8.0,
    },
    ActionItem {
        id: "e3",
        title: "Dedicated Account Management",
        description: "Assign dedicated account managers for corporate clients. Provide \
                      personalized support, regular reviews, and proactive issue \
                      resolution.",
        priority: Priority::Medium,
        timeline: "1-2 months",
        estimated_impact: 12.0,
        kpis: &[
            Kpi { name: "Client Satisfaction Score", target: "90%" },
            Kpi { name: "Issue Resolution Time", target: "<4 hours" },
        ],
        category: Pillar::E,
        required_adjustment: 5.0,
    },
    ActionItem {
        id: "e4",
        title: "Expand Provider Network",
        description: "Add more healthcare providers to the network, especially in \
                      underserved areas. Include specialty clinics, pharmacies, and \
                      diagnostic centers.",
        priority: Priority::Medium,
        timeline: "6-12 months",
        estimated_impact: 10.0,
        kpis: &[
            Kpi { name: "Network Size Increase", target: "+30%" },
            Kpi { name: "Geographic Coverage", target: "95%" },
        ],
        category: Pillar::E,
        required_adjustment: 5.0,
    },
    ActionItem {
        id: "e5",
        title: "24/7 Customer Support Center",
        description: "Establish round-the-clock customer support with multilingual agents. \
                      Implement chatbot for common queries and escalation paths for complex \
                      issues.",
        priority: Priority::High,
        timeline: "2-4 months",
        estimated_impact: 14.0,
        kpis: &[
            Kpi { name: "First Call Resolution", target: "80%" },
            Kpi { name: "Average Wait Time", target: "<2 min" },
        ],
        category: Pillar::E,
        required_adjustment: 7.0,
    },
];

/// Utilization (U) pillar initiatives.
pub static UTILIZATION_RECOMMENDATIONS: &[ActionItem] = &[
    ActionItem {
        id: "u1",
        title: "Implement Prior Authorization Optimization",
        description: "Deploy smart pre-authorization system to reduce unnecessary \
                      procedures while ensuring appropriate care. Use AI to identify \
                      high-value treatments and reduce waste.",
        priority: Priority::High,
        timeline: "3-6 months",
        estimated_impact: 20.0,
        kpis: &[
            Kpi { name: "Unnecessary Procedures", target: "-25%" },
            Kpi { name: "Cost per Member", target: "-15%" },
        ],
        category: Pillar::U,
        required_adjustment: 10.0,
    },
    ActionItem {
        id: "u2",
        title: "Generic Medication Program",
        description: "Encourage generic medication substitution where clinically \
                      appropriate. Implement tiered formulary with incentives for \
                      cost-effective medications.",
        priority: Priority::High,
        timeline: "2-4 months",
        estimated_impact: 15.0,
        kpis: &[
            Kpi { name: "Generic Fill Rate", target: "85%" },
            Kpi { name: "Pharmacy Cost Savings", target: "20%" },
        ],
        category: Pillar::U,
        required_adjustment: 8.0,
    },
    ActionItem {
        id: "u3",
        title: "Care Navigation Services",
        description: "Provide care navigators to guide members to appropriate care \
                      settings. Redirect non-emergency cases from ER to urgent care or \
                      primary care.",
        priority: Priority::Medium,
        timeline: "2-3 months",
        estimated_impact: 12.0,
        kpis: &[
            Kpi { name: "ER Utilization", target: "-30%" },
            Kpi { name: "Primary Care Visits", target: "+20%" },
        ],
        category: Pillar::U,
        required_adjustment: 5.0,
    },
    ActionItem {
        id: "u4",
        title: "Fraud Detection System",
        description: "Implement AI-powered fraud detection to identify suspicious claims \
                      patterns. Include provider audits and member education on proper \
                      claims submission.",
        priority: Priority::High,
        timeline: "4-6 months",
        estimated_impact: 18.0,
        kpis: &[
            Kpi { name: "Fraud Detection Rate", target: "+50%" },
            Kpi { name: "Claims Leakage", target: "-40%" },
        ],
        category: Pillar::U,
        required_adjustment: 10.0,
    },
    ActionItem {
        id: "u5",
        title: "Value-Based Provider Contracts",
        description: "Transition from fee-for-service to value-based contracts with key \
                      providers. Align incentives around quality outcomes rather than \
                      volume.",
        priority: Priority::Medium,
        timeline: "6-12 months",
        estimated_impact: 15.0,
        kpis: &[
            Kpi { name: "Value-Based Contracts", target: "40%" },
            Kpi { name: "Quality Score Improvement", target: "+15%" },
        ],
        category: Pillar::U,
        required_adjustment: 7.0,
    },
];

/// Aggregate impact of a recommendation set, weighted like the IVI itself.
#[derive(Debug, Clone, Copy, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImpactSummary {
    pub h_impact: f64,
    pub e_impact: f64,
    pub u_impact: f64,
    pub total_impact: f64,
}

/// One phase of the implementation roadmap.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoadmapPhase {
    pub phase: &'static str,
    pub timeline: &'static str,
    pub actions: Vec<&'static ActionItem>,
}

/// Select catalog items matching a what-if scenario.
///
/// A pillar contributes items only when its adjustment is strictly positive,
/// and then only items whose threshold the adjustment reaches. Results sort
/// by priority (high first), ties broken by estimated impact descending.
pub fn generate_recommendations(
    h_adjustment: f64,
    e_adjustment: f64,
    u_adjustment: f64,
) -> Vec<&'static ActionItem> {
    let mut recommendations: Vec<&'static ActionItem> = Vec::new();

    for (adjustment, catalog) in [
        (h_adjustment, HEALTH_RECOMMENDATIONS),
        (e_adjustment, EXPERIENCE_RECOMMENDATIONS),
        (u_adjustment, UTILIZATION_RECOMMENDATIONS),
    ] {
        if adjustment > 0.0 {
            recommendations
                .extend(catalog.iter().filter(|r| r.required_adjustment <= adjustment));
        }
    }

    recommendations.sort_by(|a, b| {
        a.priority.cmp(&b.priority).then_with(|| {
            b.estimated_impact
                .partial_cmp(&a.estimated_impact)
                .unwrap_or(Ordering::Equal)
        })
    });
    recommendations
}

/// Sum per-pillar impacts and derive the composite effect.
pub fn calculate_total_impact(recommendations: &[&'static ActionItem]) -> ImpactSummary {
    let pillar_sum = |pillar: Pillar| -> f64 {
        recommendations
            .iter()
            .filter(|r| r.category == pillar)
            .map(|r| r.estimated_impact)
            .sum()
    };

    let h_impact = pillar_sum(Pillar::H);
    let e_impact = pillar_sum(Pillar::E);
    let u_impact = pillar_sum(Pillar::U);

    ImpactSummary {
        h_impact,
        e_impact,
        u_impact,
        total_impact: HEALTH_WEIGHT * h_impact
            + EXPERIENCE_WEIGHT * e_impact
            + UTILIZATION_WEIGHT * u_impact,
    }
}

fn is_immediate(timeline: &str) -> bool {
    ["1-2", "1-3", "2-3", "2-4"].iter().any(|m| timeline.contains(m))
}

fn is_short_term(timeline: &str) -> bool {
    ["3-6", "4-6", "4-8"].iter().any(|m| timeline.contains(m))
}

fn is_long_term(timeline: &str) -> bool {
    timeline.contains("6-12")
}

/// Group recommendations into up to three delivery phases by timeline.
/// Phases with no actions are dropped.
pub fn implementation_roadmap(recommendations: &[&'static ActionItem]) -> Vec<RoadmapPhase> {
    let collect = |pred: fn(&str) -> bool| -> Vec<&'static ActionItem> {
        recommendations
            .iter()
            .copied()
            .filter(|r| pred(r.timeline))
            .collect()
    };

    let phases = vec![
        RoadmapPhase {
            phase: "Phase 1: Immediate",
            timeline: "1-4 months",
            actions: collect(is_immediate),
        },
        RoadmapPhase {
            phase: "Phase 2: Short-term",
            timeline: "3-8 months",
            actions: collect(is_short_term),
        },
        RoadmapPhase {
            phase: "Phase 3: Long-term",
            timeline: "6-12 months",
            actions: collect(is_long_term),
        },
    ];

    phases.into_iter().filter(|p| !p.actions.is_empty()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_adjustments_yield_nothing() {
        assert!(generate_recommendations(0.0, 0.0, 0.0).is_empty());
    }

    #[test]
    fn test_negative_adjustments_yield_nothing() {
        assert!(generate_recommendations(-10.0, -10.0, -10.0).is_empty());
    }

    #[test]
    fn test_single_pillar_selection() {
        let health = generate_recommendations(10.0, 0.0, 0.0);
        assert!(!health.is_empty());
        assert!(health.iter().all(|r| r.category == Pillar::H));

        let experience = generate_recommendations(0.0, 10.0, 0.0);
        assert!(!experience.is_empty());
        assert!(experience.iter().all(|r| r.category == Pillar::E));

        let utilization = generate_recommendations(0.0, 0.0, 10.0);
        assert!(!utilization.is_empty());
        assert!(utilization.iter().all(|r| r.category == Pillar::U));
    }

    #[test]
    fn test_mixed_adjustments_cover_all_pillars() {
        let recs = generate_recommendations(20.0, 20.0, 20.0);
        assert_eq!(recs.len(), 15);
        assert!(recs.iter().any(|r| r.category == Pillar::H));
        assert!(recs.iter().any(|r| r.category == Pillar::E));
        assert!(recs.iter().any(|r| r.category == Pillar::U));
    }

    #[test]
    fn test_threshold_filters_by_adjustment_size() {
        // Only h4 (threshold 3) qualifies at +3.
        let small = generate_recommendations(3.0, 0.0, 0.0);
        assert_eq!(small.len(), 1);
        assert_eq!(small[0].id, "h4");

        let large = generate_recommendations(15.0, 0.0, 0.0);
        assert_eq!(large.len(), HEALTH_RECOMMENDATIONS.len());
        assert!(large.len() >= small.len());
    }

    #[test]
    fn test_sorted_by_priority_then_impact() {
        let recs = generate_recommendations(20.0, 20.0, 20.0);

        // No high-priority item may appear after a medium one, and no
        // medium after a low.
        let mut seen_medium = false;
        let mut seen_low = false;
        for rec in &recs {
            match rec.priority {
                Priority::High => assert!(!seen_medium && !seen_low),
                Priority::Medium => {
                    seen_medium = true;
                    assert!(!seen_low);
                }
                Priority::Low => seen_low = true,
            }
        }

        // Within the leading high-priority block, impact is non-increasing.
        let highs: Vec<f64> = recs
            .iter()
            .filter(|r| r.priority == Priority::High)
            .map(|r| r.estimated_impact)
            .collect();
        assert!(highs.windows(2).all(|w| w[0] >= w[1]));
        assert_eq!(recs[0].estimated_impact, 20.0);
    }

    #[test]
    fn test_total_impact_empty() {
        let summary = calculate_total_impact(&[]);
        assert_eq!(summary.h_impact, 0.0);
        assert_eq!(summary.e_impact, 0.0);
        assert_eq!(summary.u_impact, 0.0);
        assert_eq!(summary.total_impact, 0.0);
    }

    #[test]
    fn test_total_impact_isolates_pillars() {
        let health_only = generate_recommendations(20.0, 0.0, 0.0);
        let summary = calculate_total_impact(&health_only);
        assert!(summary.h_impact > 0.0);
        assert_eq!(summary.e_impact, 0.0);
        assert_eq!(summary.u_impact, 0.0);
    }

    #[test]
    fn test_total_impact_uses_ivi_weights() {
        let recs = generate_recommendations(20.0, 20.0, 20.0);
        let summary = calculate_total_impact(&recs);
        let expected = 0.4 * summary.h_impact + 0.3 * summary.e_impact + 0.3 * summary.u_impact;
        assert!((summary.total_impact - expected).abs() < 1e-9);
    }

    #[test]
    fn test_roadmap_empty_for_no_recommendations() {
        assert!(implementation_roadmap(&[]).is_empty());
    }

    #[test]
    fn test_roadmap_groups_by_timeline() {
        let recs = generate_recommendations(20.0, 20.0, 20.0);
        let roadmap = implementation_roadmap(&recs);

        assert_eq!(roadmap.len(), 3);
        assert_eq!(roadmap[0].phase, "Phase 1: Immediate");
        assert_eq!(roadmap[1].phase, "Phase 2: Short-term");
        assert_eq!(roadmap[2].phase, "Phase 3: Long-term");

        // h4, h5, e3, e5, u2, u3 are immediate; h1, h3, e1, e2, u1, u4
        // short-term; h2, e4, u5 long-term.
        assert_eq!(roadmap[0].actions.len(), 6);
        assert_eq!(roadmap[1].actions.len(), 6);
        assert_eq!(roadmap[2].actions.len(), 3);

        let total: usize = roadmap.iter().map(|p| p.actions.len()).sum();
        assert_eq!(total, recs.len());
    }

    #[test]
    fn test_roadmap_drops_empty_phases() {
        // +5 on U selects only u3 (2-3 months), an immediate item.
        let recs = generate_recommendations(0.0, 0.0, 5.0);
        assert_eq!(recs.len(), 1);
        let roadmap = implementation_roadmap(&recs);
        assert_eq!(roadmap.len(), 1);
        assert_eq!(roadmap[0].phase, "Phase 1: Immediate");
    }

    #[test]
    fn test_catalog_integrity() {
        let all: Vec<&ActionItem> = HEALTH_RECOMMENDATIONS
            .iter()
            .chain(EXPERIENCE_RECOMMENDATIONS.iter())
            .chain(UTILIZATION_RECOMMENDATIONS.iter())
            .collect();

        assert_eq!(all.len(), 15);
        for rec in &all {
            assert!(!rec.id.is_empty());
            assert!(!rec.title.is_empty());
            assert!(!rec.description.is_empty());
            assert!(rec.estimated_impact > 0.0);
            assert!(rec.required_adjustment > 0.0);
            assert!(!rec.kpis.is_empty());
        }

        let mut ids: Vec<&str> = all.iter().map(|r| r.id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), all.len(), "catalog ids must be unique");

        assert!(HEALTH_RECOMMENDATIONS.iter().all(|r| r.category == Pillar::H));
        assert!(EXPERIENCE_RECOMMENDATIONS.iter().all(|r| r.category == Pillar::E));
        assert!(UTILIZATION_RECOMMENDATIONS.iter().all(|r| r.category == Pillar::U));
    }
}
