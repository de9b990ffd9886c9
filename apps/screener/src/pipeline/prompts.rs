// All LLM prompt constants for the pipeline stages. Every prompt demands
// JSON-only output matching the exact schema its stage deserializes.

/// System prompt for requirement extraction; enforces JSON-only output.
pub const REQUIREMENTS_SYSTEM: &str =
    "You are a strict recruitment screening expert analysing a job description. \
    Extract the distinct skills and competencies the role requires. \
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences.";

/// Requirement extraction template. Replace `{jd_context}` before sending.
pub const REQUIREMENTS_PROMPT_TEMPLATE: &str = r#"From the job description context below, extract every distinct required skill, technology or competency, in the order it appears.

Return a JSON object with this EXACT schema (no extra fields):
{
  "requirements": ["Kubernetes", "Python", "SQL"]
}

Rules:
- One short term per requirement ("Kubernetes", not "3+ years of Kubernetes experience").
- Preserve the order requirements appear in the context.
- No duplicates.
- Include both hard requirements and strongly implied competencies; skip perks and company blurb.

JOB DESCRIPTION CONTEXT:
{jd_context}"#;

/// System prompt for interview question generation.
pub const QUESTION_SYSTEM: &str =
    "You are an interviewer designing one interview question for a specific \
    skill gap between a candidate's resume and a job description. \
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences.";

/// Question template. Replace `{skill}`, `{difficulty}`, `{jd_context}`.
pub const QUESTION_PROMPT_TEMPLATE: &str = r#"Write ONE {difficulty} interview question probing the candidate's knowledge of {skill}, grounded in how the role actually uses it.

Return a JSON object with this EXACT schema:
{
  "question": "..."
}

Rules:
- The question must be answerable verbally, practical, and specific to {skill}.
- Ground the phrasing in the job description context below; ask about what the role needs, not trivia.

JOB DESCRIPTION CONTEXT:
{jd_context}"#;

/// System prompt for answer evaluation.
pub const EVALUATION_SYSTEM: &str =
    "You are a strict technical evaluator scoring a candidate's answer to an \
    interview question against the competency the role requires. \
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences.";

/// Evaluation template. Replace `{question}`, `{skill}`, `{jd_context}`, `{answer}`.
pub const EVALUATION_PROMPT_TEMPLATE: &str = r#"Evaluate the candidate's answer below.

Return a JSON object with this EXACT schema:
{
  "score": 0.0,
  "rationale": "...",
  "residual_gap": true
}

Rules:
- "score" is a number between 0.0 and 1.0 measuring correctness, completeness and relevance to the role's use of {skill}.
- "residual_gap" is true when the answer leaves real doubt the candidate can cover {skill} for this role, false when it convincingly closes the gap.
- Keep "rationale" to two or three sentences.

EXPECTED COMPETENCY CONTEXT (from the job description):
{jd_context}

QUESTION:
{question}

CANDIDATE ANSWER:
{answer}"#;

/// System prompt for learning plan generation.
pub const PLAN_SYSTEM: &str =
    "You are a career coach creating a focused study recommendation for one \
    skill gap. Keep it practical and concrete. \
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences.";

/// Plan template. Replace `{skill}`, `{severity}`, `{jd_evidence}`.
pub const PLAN_PROMPT_TEMPLATE: &str = r#"The candidate has a {severity} gap in {skill} relative to the role described below. Recommend how to close it.

Return a JSON object with this EXACT schema:
{
  "resources": ["Label: https://example.com", "Book or course name"],
  "estimated_effort": "e.g. 2 weeks of evenings"
}

Rules:
- 2 to 4 concrete resources, most useful first. Prefer "Label: URL" form where a URL exists.
- "estimated_effort" is a single realistic phrase scaled to the severity of the gap.

WHAT THE ROLE NEEDS:
{jd_evidence}"#;
