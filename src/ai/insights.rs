//! Advice generators.
//!
//! Each generator takes an explicit aggregates struct, asks the model for a
//! JSON object of an exact shape and validates it. Any failure (gateway,
//! parse, validation) is logged and answered by the matching pure fallback,
//! so callers always receive a complete result.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::regret::description_matches;
use super::reply::{parse_object, require_items, require_text, ReplyError};
use crate::ledger::Category;
use crate::llm::CompletionGateway;

/// Validation applied to a model reply after it deserialized.
trait Checked {
    fn check(&self) -> Result<(), ReplyError>;
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalSnapshot {
    pub name: String,
    pub target: f64,
    pub current: f64,
    pub deadline: DateTime<Utc>,
}

fn percent(part: f64, whole: f64) -> Option<f64> {
    if whole > 0.0 {
        Some(part * 100.0 / whole)
    } else {
        None
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Affordability
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AffordabilityInput {
    pub item_name: String,
    pub item_price: f64,
    pub category: Category,
    /// Income recorded this month
    pub month_income: f64,
    /// Expenses recorded this month
    pub month_expenses: f64,
    pub category_budget: Option<f64>,
    pub category_spent: f64,
    pub goals: Vec<GoalSnapshot>,
}

impl AffordabilityInput {
    pub fn available(&self) -> f64 {
        self.month_income - self.month_expenses
    }

    pub fn category_remaining(&self) -> Option<f64> {
        self.category_budget.map(|b| b - self.category_spent)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AffordabilityAnalysis {
    pub decision: bool,
    pub tip: String,
    pub impact: String,
    pub confidence: f64,
    pub alternatives: Vec<String>,
}

impl Checked for AffordabilityAnalysis {
    fn check(&self) -> Result<(), ReplyError> {
        require_text("tip", &self.tip)?;
        require_text("impact", &self.impact)?;
        require_items("alternatives", &self.alternatives)?;
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(ReplyError::Invalid(format!(
                "confidence {} is outside [0, 1]",
                self.confidence
            )));
        }
        Ok(())
    }
}

pub fn affordability_prompt(input: &AffordabilityInput) -> String {
    format!(
        r#"You are a personal finance advisor. Decide whether the user can afford this purchase.

Purchase and this month's finances (JSON):
{data}

Reply with a single JSON object and nothing else, exactly in this shape:
{{"decision": true, "tip": "<one sentence>", "impact": "<one sentence on budget impact>", "confidence": 0.8, "alternatives": ["<option>", "<option>"]}}

"decision" is true when the purchase is affordable. "confidence" is between 0 and 1."#,
        data = serde_json::to_string_pretty(input).unwrap_or_default()
    )
}

/// Affordable iff the price fits the month's surplus and, when the category
/// has a budget, what is left of it.
pub fn affordability_fallback(input: &AffordabilityInput) -> AffordabilityAnalysis {
    let available = input.available();
    let within_category = input
        .category_remaining()
        .map_or(true, |remaining| input.item_price <= remaining);
    let decision = input.item_price <= available && within_category;

    let impact = match percent(input.item_price, available) {
        Some(share) => format!(
            "This would use {:.1}% of your available budget this month.",
            share
        ),
        None => format!(
            "You have no surplus left this month, so {} would be spent beyond your income.",
            input.item_price
        ),
    };

    AffordabilityAnalysis {
        decision,
        tip: if decision {
            "Looks affordable based on your current budget!".to_string()
        } else {
            "This might stretch your budget too thin.".to_string()
        },
        impact,
        confidence: 0.6,
        alternatives: vec![
            "Wait until next month".to_string(),
            "Look for a less expensive option".to_string(),
        ],
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Regret risk
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PastRegret {
    pub description: String,
    pub amount: f64,
    pub category: Category,
    pub notes: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegretRiskInput {
    pub item_name: String,
    pub item_price: f64,
    pub category: Category,
    pub current_mood: String,
    /// Newest first
    pub past_regrets: Vec<PastRegret>,
    pub average_expense: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegretRisk {
    #[serde(alias = "LOW", alias = "low")]
    Low,
    #[serde(alias = "MEDIUM", alias = "medium")]
    Medium,
    #[serde(alias = "HIGH", alias = "high")]
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RegretPrediction {
    pub regret_risk: RegretRisk,
    pub memory: String,
    pub suggestion: String,
    pub emotional_note: String,
}

impl Checked for RegretPrediction {
    fn check(&self) -> Result<(), ReplyError> {
        require_text("memory", &self.memory)?;
        require_text("suggestion", &self.suggestion)?;
        require_text("emotionalNote", &self.emotional_note)
    }
}

pub fn regret_risk_prompt(input: &RegretRiskInput) -> String {
    format!(
        r#"You are a mindful spending coach. Predict how likely the user is to regret this purchase, using their own regret history.

Purchase, mood and history (JSON):
{data}

Reply with a single JSON object and nothing else, exactly in this shape:
{{"regretRisk": "Low" | "Medium" | "High", "memory": "<relevant past purchase>", "suggestion": "<one sentence>", "emotionalNote": "<one sentence>"}}"#,
        data = serde_json::to_string_pretty(input).unwrap_or_default()
    )
}

pub fn regret_risk_fallback(input: &RegretRiskInput) -> RegretPrediction {
    let similar: Vec<&PastRegret> = input
        .past_regrets
        .iter()
        .filter(|p| p.category == input.category || description_matches(&p.description, &input.item_name))
        .collect();
    let expensive = input.average_expense > 0.0 && input.item_price > input.average_expense * 1.5;

    let regret_risk = match (!similar.is_empty(), expensive) {
        (true, true) => RegretRisk::High,
        (true, false) | (false, true) => RegretRisk::Medium,
        (false, false) => RegretRisk::Low,
    };

    let memory = match similar.first() {
        Some(p) if !p.notes.trim().is_empty() => format!(
            "You regretted \"{}\" before: {}",
            p.description, p.notes
        ),
        Some(p) => format!("You regretted \"{}\" before.", p.description),
        None => "You haven't flagged any similar purchases as regrets.".to_string(),
    };

    let suggestion = match regret_risk {
        RegretRisk::High => {
            "Wait 48 hours before buying and check whether you still want it.".to_string()
        }
        RegretRisk::Medium => {
            "Consider waiting a day to make sure this isn't an impulse buy.".to_string()
        }
        RegretRisk::Low => "This looks consistent with purchases you've been happy with.".to_string(),
    };

    let mood = input.current_mood.trim();
    let emotional_note = if mood.is_empty() || mood.eq_ignore_ascii_case("neutral") {
        "Lasting satisfaction comes from purchases that match your values and goals.".to_string()
    } else {
        format!(
            "You mentioned feeling {}. Purchases made in a strong mood are the ones most often regretted.",
            mood
        )
    };

    RegretPrediction {
        regret_risk,
        memory,
        suggestion,
        emotional_note,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Overspending
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetUsage {
    pub category: Category,
    pub budget: f64,
    pub spent: f64,
}

impl BudgetUsage {
    pub fn remaining(&self) -> f64 {
        self.budget - self.spent
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryVelocity {
    pub category: Category,
    pub spent: f64,
    pub daily_average: f64,
    pub projected_month_end: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverspendingInput {
    pub budgets: Vec<BudgetUsage>,
    pub velocity: Vec<CategoryVelocity>,
    pub days_passed: u32,
    pub days_left: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct OverspendingAnalysis {
    pub critical_categories: Vec<String>,
    pub month_end_predictions: Vec<String>,
    pub quick_fixes: Vec<String>,
    pub spending_personality: String,
    pub success_metric: String,
}

impl Checked for OverspendingAnalysis {
    fn check(&self) -> Result<(), ReplyError> {
        require_items("criticalCategories", &self.critical_categories)?;
        require_items("monthEndPredictions", &self.month_end_predictions)?;
        require_items("quickFixes", &self.quick_fixes)?;
        require_text("spendingPersonality", &self.spending_personality)?;
        require_text("successMetric", &self.success_metric)
    }
}

pub fn overspending_prompt(input: &OverspendingInput) -> String {
    format!(
        r#"You are a budgeting coach. Analyse this month's budgets and spending velocity and warn about overspending.

Budgets, spending velocity and days in the month (JSON):
{data}

Reply with a single JSON object and nothing else, exactly in this shape:
{{"criticalCategories": ["<category and why>"], "monthEndPredictions": ["<category and projection>"], "quickFixes": ["<action>"], "spendingPersonality": "<one sentence>", "successMetric": "<one measurable target>"}}

Use a single entry such as "None" when a list has nothing to report."#,
        data = serde_json::to_string_pretty(input).unwrap_or_default()
    )
}

/// Critical: more than 90% of a budget used. Predicted overrun: velocity
/// projection beyond the budget.
pub fn overspending_fallback(input: &OverspendingInput) -> OverspendingAnalysis {
    let mut critical = Vec::new();
    let mut predictions = Vec::new();

    for usage in &input.budgets {
        match percent(usage.spent, usage.budget) {
            Some(used) if used > 90.0 => critical.push(format!(
                "{} ({:.2} of {:.2} spent, {:.1}%)",
                usage.category, usage.spent, usage.budget, used
            )),
            None if usage.spent > 0.0 => critical.push(format!(
                "{} ({:.2} spent against a zero budget)",
                usage.category, usage.spent
            )),
            _ => {}
        }

        let projection = input
            .velocity
            .iter()
            .find(|v| v.category == usage.category)
            .map(|v| v.projected_month_end);
        if let Some(projected) = projection.filter(|p| *p > usage.budget) {
            predictions.push(format!(
                "{} (projected {:.2} against a budget of {:.2})",
                usage.category, projected, usage.budget
            ));
        }
    }

    if critical.is_empty() {
        critical.push("No critical categories detected".to_string());
    }
    if predictions.is_empty() {
        predictions.push("No categories projected to exceed budget".to_string());
    }

    let mut quick_fixes = vec![
        "Review your highest spending categories and cut unnecessary expenses.".to_string(),
    ];
    if input.days_left > 0 {
        if let Some(tightest) = input
            .budgets
            .iter()
            .filter(|u| u.remaining() > 0.0)
            .min_by(|a, b| a.remaining().total_cmp(&b.remaining()))
        {
            quick_fixes.push(format!(
                "Keep {} under {:.2} per day for the remaining {} days.",
                tightest.category,
                tightest.remaining() / input.days_left as f64,
                input.days_left
            ));
        }
    }
    quick_fixes.push("Set spending alerts for categories close to their limits.".to_string());

    OverspendingAnalysis {
        critical_categories: critical,
        month_end_predictions: predictions,
        quick_fixes,
        spending_personality:
            "Your spending patterns suggest you may benefit from more detailed budget tracking."
                .to_string(),
        success_metric: "Staying within budget could save you 10-15% of your monthly expenses."
            .to_string(),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Savings optimisation
// ─────────────────────────────────────────────────────────────────────────────

/// Number of this month's expenses by size: under 100, 100 to 500, over 500.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseBuckets {
    pub small: usize,
    pub medium: usize,
    pub large: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SavingsInput {
    pub daily_average: f64,
    pub monthly_total: f64,
    pub year_projection: f64,
    pub purchases: PurchaseBuckets,
    pub goals: Vec<GoalSnapshot>,
    pub round_up_increment: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SavingsOptimization {
    pub optimization_potential: String,
    pub recommended_setting: String,
    pub savings_challenge: String,
    pub goal_timeline: String,
    pub micro_investment_tip: String,
}

impl Checked for SavingsOptimization {
    fn check(&self) -> Result<(), ReplyError> {
        require_text("optimizationPotential", &self.optimization_potential)?;
        require_text("recommendedSetting", &self.recommended_setting)?;
        require_text("savingsChallenge", &self.savings_challenge)?;
        require_text("goalTimeline", &self.goal_timeline)?;
        require_text("microInvestmentTip", &self.micro_investment_tip)
    }
}

pub fn savings_prompt(input: &SavingsInput) -> String {
    format!(
        r#"You are a savings optimisation expert. Help this user get more out of round-up savings, where each expense is rounded up to the next multiple of the increment and the difference is saved.

Round-up performance, purchase sizes, goals and the current increment (JSON):
{data}

Reply with a single JSON object and nothing else, exactly in this shape:
{{"optimizationPotential": "<one sentence>", "recommendedSetting": "<one sentence>", "savingsChallenge": "<one sentence>", "goalTimeline": "<one sentence>", "microInvestmentTip": "<one sentence>"}}"#,
        data = serde_json::to_string_pretty(input).unwrap_or_default()
    )
}

/// Estimates assume an average round-up of half an increment per small or
/// medium purchase.
pub fn savings_fallback(input: &SavingsInput) -> SavingsOptimization {
    let increment = input.round_up_increment;
    let suggested = if increment < 10.0 { 10.0 } else { increment };
    let eligible = (input.purchases.small + input.purchases.medium) as f64;
    let potential_yearly = eligible * suggested / 2.0 * 12.0;
    let additional = (potential_yearly - input.monthly_total * 12.0).max(0.0);

    let recommended_setting = if suggested > increment {
        format!(
            "Consider raising your round-up increment from {} to {} for more savings.",
            increment, suggested
        )
    } else {
        format!(
            "Your round-up increment of {} already captures most small purchases; keep it.",
            increment
        )
    };

    let open_goal = input
        .goals
        .iter()
        .filter(|g| g.current < g.target)
        .min_by_key(|g| g.deadline);
    let goal_timeline = match open_goal {
        Some(goal) if input.daily_average > 0.0 => {
            let months = (goal.target - goal.current) / (input.daily_average * 30.0);
            format!(
                "At your current round-up pace, \"{}\" needs about {:.1} more months.",
                goal.name, months
            )
        }
        Some(goal) => format!(
            "Round-ups haven't started adding up yet; they could help close the gap on \"{}\".",
            goal.name
        ),
        None => "Set a savings goal to give your round-ups a target.".to_string(),
    };

    SavingsOptimization {
        optimization_potential: format!(
            "You could save approximately {:.2} more per year by optimising your round-up strategy.",
            additional
        ),
        recommended_setting,
        savings_challenge: format!(
            "Round every purchase up to the nearest {} for one week to boost your savings.",
            suggested * 5.0
        ),
        goal_timeline,
        micro_investment_tip:
            "Move your round-up savings into a separate high-yield savings account each month."
                .to_string(),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Local financial insights
// ─────────────────────────────────────────────────────────────────────────────

/// Income and expense totals for one month.
#[derive(Debug, Clone, Default)]
pub struct MonthTotals {
    pub income: f64,
    pub expenses: f64,
    /// Expense total per category, largest first
    pub by_category: Vec<(Category, f64)>,
}

impl MonthTotals {
    pub fn spent_on(&self, category: Category) -> f64 {
        self.by_category
            .iter()
            .find(|(c, _)| *c == category)
            .map_or(0.0, |(_, amount)| *amount)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthFigures {
    pub income: f64,
    pub expenses: f64,
    pub savings: f64,
    pub savings_rate: f64,
}

impl From<&MonthTotals> for MonthFigures {
    fn from(t: &MonthTotals) -> Self {
        let savings = t.income - t.expenses;
        Self {
            income: t.income,
            expenses: t.expenses,
            savings,
            savings_rate: percent(savings, t.income).unwrap_or(0.0),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Trends {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub income_change: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expense_change: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InsightSummary {
    pub current_month: MonthFigures,
    pub previous_month: MonthFigures,
    pub trends: Trends,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopCategory {
    pub category: Category,
    pub amount: f64,
    pub percentage: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinancialInsights {
    pub summary: InsightSummary,
    pub top_categories: Vec<TopCategory>,
    pub insights: Vec<String>,
}

fn change(current: f64, previous: f64) -> Option<f64> {
    percent(current - previous, previous)
}

fn trend_sentence(subject: &str, verb: &str, change: Option<f64>) -> Option<String> {
    let change = change.filter(|c| *c != 0.0)?;
    let direction = if change > 0.0 { "increased" } else { "decreased" };
    Some(format!(
        "Your {} {} {} by {:.1}% compared to last month.",
        subject,
        verb,
        direction,
        change.abs()
    ))
}

/// Month-over-month summary computed without the model.
pub fn financial_insights(
    current: &MonthTotals,
    previous: &MonthTotals,
    budgets: &[BudgetUsage],
) -> FinancialInsights {
    let current_figures = MonthFigures::from(current);
    let trends = Trends {
        income_change: change(current.income, previous.income),
        expense_change: change(current.expenses, previous.expenses),
    };

    let top_categories = current
        .by_category
        .iter()
        .take(3)
        .map(|(category, amount)| TopCategory {
            category: *category,
            amount: *amount,
            percentage: percent(*amount, current.expenses).unwrap_or(0.0),
        })
        .collect();

    let mut insights = Vec::new();
    insights.extend(trend_sentence("income", "has", trends.income_change));
    insights.extend(trend_sentence("expenses", "have", trends.expense_change));

    let rate = current_figures.savings_rate;
    if rate > 20.0 {
        insights.push(format!(
            "Great job! Your savings rate this month is {:.1}%.",
            rate
        ));
    } else if rate > 0.0 {
        insights.push(format!(
            "Your savings rate this month is {:.1}%. Consider increasing your savings.",
            rate
        ));
    } else if current.expenses > 0.0 {
        insights.push(
            "You're spending more than you earn this month. Consider reducing expenses."
                .to_string(),
        );
    }

    for (category, amount) in &current.by_category {
        let before = previous.spent_on(*category);
        if before > 0.0 && *amount > before * 1.2 {
            insights.push(format!(
                "Your spending on {} has increased by {:.1}% compared to last month.",
                category,
                (amount - before) * 100.0 / before
            ));
        }
    }

    for usage in budgets {
        if let Some(used) = percent(usage.spent, usage.budget).filter(|p| *p >= 90.0) {
            insights.push(format!(
                "You've used {:.1}% of your {} budget.",
                used, usage.category
            ));
        }
    }

    FinancialInsights {
        summary: InsightSummary {
            current_month: current_figures,
            previous_month: MonthFigures::from(previous),
            trends,
        },
        top_categories,
        insights,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Service
// ─────────────────────────────────────────────────────────────────────────────

/// Stateless front for the model-backed generators.
#[derive(Clone)]
pub struct InsightService {
    gateway: CompletionGateway,
}

impl InsightService {
    pub fn new(gateway: CompletionGateway) -> Self {
        Self { gateway }
    }

    async fn generate<T, F>(&self, label: &str, prompt: String, fallback: F) -> T
    where
        T: DeserializeOwned + Checked,
        F: FnOnce() -> T,
    {
        let reply = match self.gateway.complete(&prompt).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!("{} generation failed, using fallback: {}", label, e);
                return fallback();
            }
        };

        match parse_object::<T>(&reply).and_then(|value| value.check().map(|_| value)) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!("{} reply rejected, using fallback: {}", label, e);
                tracing::debug!("Rejected {} reply: {}", label, reply);
                fallback()
            }
        }
    }

    pub async fn affordability(&self, input: &AffordabilityInput) -> AffordabilityAnalysis {
        self.generate("Affordability", affordability_prompt(input), || {
            affordability_fallback(input)
        })
        .await
    }

    pub async fn regret_risk(&self, input: &RegretRiskInput) -> RegretPrediction {
        self.generate("Regret risk", regret_risk_prompt(input), || {
            regret_risk_fallback(input)
        })
        .await
    }

    pub async fn overspending(&self, input: &OverspendingInput) -> OverspendingAnalysis {
        self.generate("Overspending", overspending_prompt(input), || {
            overspending_fallback(input)
        })
        .await
    }

    pub async fn savings_optimization(&self, input: &SavingsInput) -> SavingsOptimization {
        self.generate("Savings optimisation", savings_prompt(input), || {
            savings_fallback(input)
        })
        .await
    }
}
