//! Prompt templates for the generation stages.

/// Substituted for a missing job description.
pub const NOT_PROVIDED: &str = "Not provided";

fn or_not_provided(value: &str) -> &str {
    if value.trim().is_empty() {
        NOT_PROVIDED
    } else {
        value
    }
}

pub fn topic_analysis(topic: &str) -> String {
    format!(
        r#"You are an experienced hiring manager and career mentor.

Analyze the target role below and produce a practical skill strategy for a
candidate who wants to land it.

Target role:
{topic}

Cover, in order:
1. Role breakdown: day-to-day work and the kinds of problems handled.
2. Core skill domains: technical skills by category, theory, tooling, soft skills.
3. Industry expectations: what hiring managers look for and how interviews probe it.
4. Learning order: foundations, applied skills, specialization.
5. Portfolio strategy: project types that signal competence.
6. Common pitfalls: low-value topics learners over-invest in.
7. Career progression: entry, mid-level and long-term paths.

Be concrete and concise. Skip generic advice."#
    )
}

pub fn skill_gap(topic: &str, resume: &str, jd: &str) -> String {
    let jd = or_not_provided(jd);
    format!(
        r#"You are a technical recruiter and career coach.

Compare the candidate's resume with the job description and with what the
target role normally demands.

Target role:
{topic}

Resume:
{resume}

Job description:
{jd}

Report:
1. Verified strengths, with the evidence from the resume.
2. Partial matches: skills mentioned without depth, and the missing level.
3. Critical missing skills that block the candidate.
4. Gap ranking (high, medium, low) by hiring impact, difficulty and dependency order.
5. Interview risk areas.
6. Learning targets: topics to study, tools to practice, projects to build.
7. Readiness estimate: resume vs job description and resume vs ideal profile, as percentages.

Be honest and specific."#
    )
}

pub fn curriculum(skill_gaps: &str, analysis: &str) -> String {
    format!(
        r#"You are a learning designer and technical mentor.

Turn the skill gap report and the role analysis into a dependency-aware
curriculum.

Skill gap report:
{skill_gaps}

Role analysis:
{analysis}

For each phase give: name, purpose, prerequisites, concepts in dependency
order, tools, hands-on exercises, a milestone project, estimated weeks and
completion criteria.

Then describe how the phases connect, where specialization starts and which
parts a strong candidate can skip.

Keep phases focused and optimize for job readiness."#
    )
}

pub fn roadmap(curriculum: &str, rag_context: &str, resources: &str) -> String {
    let rag_context = or_not_provided(rag_context);
    format!(
        r#"You are a career architect.

Combine the inputs below into one realistic, execution-ready roadmap.

Curriculum plan:
{curriculum}

Context from the candidate's documents:
{rag_context}

Learning resources:
{resources}

Structure the roadmap as:
1. Overview with the overall timeline.
2. Phase plan: objectives, skills, tools, mini-projects, capstone.
3. Weekly focus at a high level.
4. Portfolio projects mapped to hiring signals.
5. Readiness checks for moving between phases.
6. When and how to fold in interview preparation.
7. How to adapt when ahead of or behind schedule.
8. Target roles to apply for at the end.

Prefer depth over breadth."#
    )
}
