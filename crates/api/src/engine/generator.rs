//! Step-wise plan generators.
//!
//! The controller drives a [`PlanGenerator`] one step at a time so that
//! cancellation can be observed between steps. [`TemplatePlanGenerator`] is
//! the built-in implementation: it derives a weekly workout split, exercise
//! selection and nutrition targets from the request parameters.

use async_trait::async_trait;
use fitplan_core::plan_generation::{
    GenerationParams, DEFAULT_TOTAL_STEPS, GOAL_ENDURANCE, GOAL_FLEXIBILITY, GOAL_MUSCLE_BUILD,
    GOAL_WEIGHT_LOSS, LEVEL_ADVANCED, LEVEL_INTERMEDIATE,
};
use serde_json::{json, Map, Value};

/// Error raised by a generation step. Terminal for the job.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct GenerationError(pub String);

/// Sections of a plan accumulated across steps.
#[derive(Debug, Default)]
pub struct PlanDraft {
    sections: Map<String, Value>,
}

impl PlanDraft {
    pub fn insert(&mut self, section: &str, value: Value) {
        self.sections.insert(section.to_string(), value);
    }

    pub fn get(&self, section: &str) -> Option<&Value> {
        self.sections.get(section)
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.sections)
    }
}

/// A resumable, step-wise plan generator.
///
/// Steps are numbered from 1 to [`PlanGenerator::total_steps`].
#[async_trait]
pub trait PlanGenerator: Send + Sync {
    fn total_steps(&self) -> u32;

    /// Human-readable description of step `step`.
    fn step_message(&self, step: u32) -> String;

    /// Run step `step`, recording its output in `draft`.
    async fn run_step(
        &self,
        step: u32,
        params: &GenerationParams,
        draft: &mut PlanDraft,
    ) -> Result<(), GenerationError>;

    /// Assemble the final plan document once every step has run.
    fn finish(&self, params: &GenerationParams, draft: PlanDraft) -> Value;
}

// ---------------------------------------------------------------------------
// Template generator
// ---------------------------------------------------------------------------

const STEP_MESSAGES: [&str; DEFAULT_TOTAL_STEPS as usize] = [
    "Analyzing your profile",
    "Designing your weekly split",
    "Selecting exercises",
    "Calculating nutrition targets",
    "Finalizing your plan",
];

/// Weeks covered by a generated plan.
const PLAN_WEEKS: u32 = 4;
/// Body weight assumed when the request omits it.
const DEFAULT_BODY_WEIGHT_KG: f64 = 70.0;
/// Rough maintenance energy per kilogram of body weight.
const KCAL_PER_KG: f64 = 33.0;

struct Exercise {
    name: &'static str,
    focus: &'static str,
    /// `None` means no equipment needed.
    equipment: Option<&'static str>,
}

const EXERCISES: &[Exercise] = &[
    Exercise {
        name: "Barbell Bench Press",
        focus: "Push",
        equipment: Some("barbell"),
    },
    Exercise {
        name: "Dumbbell Shoulder Press",
        focus: "Push",
        equipment: Some("dumbbells"),
    },
    Exercise {
        name: "Push-Up",
        focus: "Push",
        equipment: None,
    },
    Exercise {
        name: "Bench Dip",
        focus: "Push",
        equipment: None,
    },
    Exercise {
        name: "Pike Push-Up",
        focus: "Push",
        equipment: None,
    },
    Exercise {
        name: "Barbell Row",
        focus: "Pull",
        equipment: Some("barbell"),
    },
    Exercise {
        name: "Lat Pulldown",
        focus: "Pull",
        equipment: Some("cable"),
    },
    Exercise {
        name: "Pull-Up",
        focus: "Pull",
        equipment: Some("pull-up bar"),
    },
    Exercise {
        name: "Dumbbell Row",
        focus: "Pull",
        equipment: Some("dumbbells"),
    },
    Exercise {
        name: "Superman Hold",
        focus: "Pull",
        equipment: None,
    },
    Exercise {
        name: "Inverted Row",
        focus: "Pull",
        equipment: None,
    },
    Exercise {
        name: "Back Squat",
        focus: "Legs",
        equipment: Some("barbell"),
    },
    Exercise {
        name: "Romanian Deadlift",
        focus: "Legs",
        equipment: Some("barbell"),
    },
    Exercise {
        name: "Goblet Squat",
        focus: "Legs",
        equipment: Some("dumbbells"),
    },
    Exercise {
        name: "Walking Lunge",
        focus: "Legs",
        equipment: None,
    },
    Exercise {
        name: "Glute Bridge",
        focus: "Legs",
        equipment: None,
    },
    Exercise {
        name: "Bodyweight Squat",
        focus: "Legs",
        equipment: None,
    },
    Exercise {
        name: "Rowing Intervals",
        focus: "Conditioning",
        equipment: Some("rower"),
    },
    Exercise {
        name: "Bike Intervals",
        focus: "Conditioning",
        equipment: Some("bike"),
    },
    Exercise {
        name: "Burpee",
        focus: "Conditioning",
        equipment: None,
    },
    Exercise {
        name: "Mountain Climber",
        focus: "Conditioning",
        equipment: None,
    },
    Exercise {
        name: "Jump Rope",
        focus: "Conditioning",
        equipment: Some("jump rope"),
    },
    Exercise {
        name: "Brisk Run",
        focus: "Conditioning",
        equipment: None,
    },
    Exercise {
        name: "World's Greatest Stretch",
        focus: "Mobility",
        equipment: None,
    },
    Exercise {
        name: "Cat-Cow",
        focus: "Mobility",
        equipment: None,
    },
    Exercise {
        name: "Hip Flexor Stretch",
        focus: "Mobility",
        equipment: None,
    },
    Exercise {
        name: "Thoracic Rotation",
        focus: "Mobility",
        equipment: None,
    },
    Exercise {
        name: "Band Pull-Apart",
        focus: "Mobility",
        equipment: Some("bands"),
    },
];

/// Built-in deterministic generator with five steps.
#[derive(Debug, Default, Clone, Copy)]
pub struct TemplatePlanGenerator;

#[async_trait]
impl PlanGenerator for TemplatePlanGenerator {
    fn total_steps(&self) -> u32 {
        DEFAULT_TOTAL_STEPS
    }

    fn step_message(&self, step: u32) -> String {
        let index = step.clamp(1, DEFAULT_TOTAL_STEPS) as usize - 1;
        STEP_MESSAGES[index].to_string()
    }

    async fn run_step(
        &self,
        step: u32,
        params: &GenerationParams,
        draft: &mut PlanDraft,
    ) -> Result<(), GenerationError> {
        match step {
            1 => draft.insert("profile", profile(params)),
            2 => {
                let split = weekly_split(&params.goal, params.days_per_week);
                draft.insert("weeklySplit", json!(split));
            }
            3 => {
                let split = draft
                    .get("weeklySplit")
                    .and_then(Value::as_array)
                    .ok_or_else(|| GenerationError("Weekly split missing".into()))?;
                let days: Vec<Value> = split
                    .iter()
                    .enumerate()
                    .map(|(i, focus)| {
                        let focus = focus.as_str().unwrap_or("Full Body");
                        json!({
                            "day": i + 1,
                            "focus": focus,
                            "exercises": select_exercises(focus, params),
                        })
                    })
                    .collect();
                draft.insert("workouts", Value::Array(days));
            }
            4 => draft.insert("nutrition", nutrition(params)),
            5 => draft.insert(
                "summary",
                json!({
                    "weeks": PLAN_WEEKS,
                    "progression": progression_note(&params.experience_level),
                }),
            ),
            other => {
                return Err(GenerationError(format!(
                    "Step {other} is outside 1..={DEFAULT_TOTAL_STEPS}"
                )))
            }
        }
        Ok(())
    }

    fn finish(&self, params: &GenerationParams, draft: PlanDraft) -> Value {
        let mut plan = draft.into_value();
        if let Value::Object(map) = &mut plan {
            map.insert("goal".into(), json!(params.goal));
            map.insert("daysPerWeek".into(), json!(params.days_per_week));
        }
        plan
    }
}

fn default_session_minutes(level: &str) -> u16 {
    match level {
        LEVEL_ADVANCED => 75,
        LEVEL_INTERMEDIATE => 60,
        _ => 45,
    }
}

fn profile(params: &GenerationParams) -> Value {
    json!({
        "goal": params.goal,
        "experienceLevel": params.experience_level,
        "daysPerWeek": params.days_per_week,
        "sessionMinutes": params
            .session_minutes
            .unwrap_or_else(|| default_session_minutes(&params.experience_level)),
        "equipment": params.equipment,
    })
}

/// Workout focus for each training day.
pub fn weekly_split(goal: &str, days_per_week: u8) -> Vec<&'static str> {
    let base: &[&str] = match days_per_week {
        0 | 1 => &["Full Body"],
        2 => &["Full Body", "Full Body"],
        3 if goal == GOAL_MUSCLE_BUILD => &["Push", "Pull", "Legs"],
        3 => &["Full Body", "Conditioning", "Full Body"],
        4 => &["Push", "Legs", "Pull", "Legs"],
        5 => &["Push", "Pull", "Legs", "Push", "Pull"],
        6 => &["Push", "Pull", "Legs", "Push", "Pull", "Legs"],
        _ => &["Push", "Pull", "Legs", "Push", "Pull", "Legs", "Mobility"],
    };

    // Cardio- and mobility-oriented goals swap every other day.
    let alternate = match goal {
        GOAL_ENDURANCE | GOAL_WEIGHT_LOSS => Some("Conditioning"),
        GOAL_FLEXIBILITY => Some("Mobility"),
        _ => None,
    };

    base.iter()
        .enumerate()
        .map(|(i, focus)| match alternate {
            Some(alt) if i % 2 == 1 => alt,
            _ => *focus,
        })
        .collect()
}

fn prescription(goal: &str) -> &'static str {
    match goal {
        GOAL_MUSCLE_BUILD => "4 x 8-12",
        GOAL_WEIGHT_LOSS => "3 x 12-15",
        GOAL_ENDURANCE => "3 x 15-20",
        GOAL_FLEXIBILITY => "2 x 30s hold",
        _ => "3 x 10-12",
    }
}

fn exercises_per_session(level: &str) -> usize {
    match level {
        LEVEL_ADVANCED => 5,
        LEVEL_INTERMEDIATE => 4,
        _ => 3,
    }
}

fn has_equipment(params: &GenerationParams, needed: Option<&str>) -> bool {
    match needed {
        None => true,
        Some(item) => params
            .equipment
            .iter()
            .any(|owned| owned.trim().eq_ignore_ascii_case(item)),
    }
}

fn select_exercises(focus: &str, params: &GenerationParams) -> Vec<Value> {
    let focuses: Vec<&str> = match focus {
        "Full Body" => vec!["Legs", "Push", "Pull"],
        "Push" | "Pull" | "Legs" | "Mobility" => vec![focus],
        _ => vec!["Conditioning"],
    };
    let limit = exercises_per_session(&params.experience_level);
    let sets = prescription(&params.goal);

    // Round-robin across focuses so full-body days stay balanced.
    let pools: Vec<Vec<&Exercise>> = focuses
        .iter()
        .map(|f| {
            EXERCISES
                .iter()
                .filter(|e| e.focus == *f && has_equipment(params, e.equipment))
                .collect()
        })
        .collect();

    let mut picked = Vec::with_capacity(limit);
    let mut round = 0;
    while picked.len() < limit {
        let mut any = false;
        for pool in &pools {
            if let Some(exercise) = pool.get(round) {
                any = true;
                if picked.len() < limit {
                    picked.push(json!({ "name": exercise.name, "sets": sets }));
                }
            }
        }
        if !any {
            break;
        }
        round += 1;
    }
    picked
}

fn nutrition(params: &GenerationParams) -> Value {
    let weight = params.body_weight_kg.unwrap_or(DEFAULT_BODY_WEIGHT_KG);
    let maintenance = weight * KCAL_PER_KG;

    let (adjustment, protein_per_kg) = match params.goal.as_str() {
        GOAL_MUSCLE_BUILD => (300.0, 2.0),
        GOAL_WEIGHT_LOSS => (-500.0, 2.2),
        GOAL_ENDURANCE => (200.0, 1.6),
        _ => (0.0, 1.4),
    };

    let calories = (maintenance + adjustment).round();
    let protein = (weight * protein_per_kg).round();
    let fat = (calories * 0.25 / 9.0).round();
    let carbs = ((calories - protein * 4.0 - fat * 9.0) / 4.0).max(0.0).round();

    let budget_tier = params.weekly_budget.map(|budget| match budget {
        b if b < 50.0 => "budget",
        b if b < 120.0 => "moderate",
        _ => "flexible",
    });

    json!({
        "dailyCalories": calories,
        "proteinGrams": protein,
        "carbGrams": carbs,
        "fatGrams": fat,
        "dietaryPreferences": params.dietary_preferences,
        "budgetTier": budget_tier,
    })
}

fn progression_note(level: &str) -> &'static str {
    match level {
        LEVEL_ADVANCED => "Add load weekly; deload in week 4",
        LEVEL_INTERMEDIATE => "Add one rep per set each week before increasing load",
        _ => "Focus on form for two weeks, then add light load",
    }
}
