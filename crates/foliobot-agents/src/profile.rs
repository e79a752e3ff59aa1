use std::path::Path;

use foliobot_common::{Error, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::router::Topic;

/// Static site data used to answer structured questions about the owner.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SiteProfile {
    pub about: About,
    #[serde(default)]
    pub education: Vec<EducationEntry>,
    pub skills: Skills,
    #[serde(default)]
    pub projects: Vec<Project>,
    #[serde(default)]
    pub interests: Vec<String>,
    pub contact: Contact,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct About {
    pub name: String,
    /// Name used in rendered sections; defaults to the first word of `name`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short_name: Option<String>,
    pub title: String,
    pub location: String,
    pub bio: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EducationEntry {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub institution: Option<String>,
    /// Heading for `highlights`, e.g. "Focus" or "Learning".
    pub highlights_label: String,
    #[serde(default)]
    pub highlights: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Skills {
    #[serde(default)]
    pub frontend: Vec<String>,
    #[serde(default)]
    pub backend: Vec<String>,
    #[serde(default)]
    pub ai_devops: Vec<String>,
    #[serde(default)]
    pub tools: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Project {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub tech: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Contact {
    pub email: String,
    #[serde(default)]
    pub github: Option<String>,
    #[serde(default)]
    pub linkedin: Option<String>,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

impl Default for SiteProfile {
    fn default() -> Self {
        Self {
            about: About {
                name: "Rameez Bader Khwaja".into(),
                short_name: None,
                title: "Full-Stack Developer & AI Enthusiast".into(),
                location: "Karachi, Pakistan".into(),
                bio: "Passionate about building modern web applications with Next.js, \
                      TypeScript, and AI integration. Currently part of Governor Sindh IT \
                      Initiative (Panaverse Program)."
                    .into(),
            },
            education: vec![
                EducationEntry {
                    name: "ADP in Computer Information Systems".into(),
                    institution: Some("Hamdard University".into()),
                    highlights_label: "Focus".into(),
                    highlights: strings(&[
                        "Programming",
                        "Software Development",
                        "Data Management",
                        "Computer Systems Architecture",
                    ]),
                },
                EducationEntry {
                    name: "Governor Sindh IT Initiative (Panaverse Program)".into(),
                    institution: None,
                    highlights_label: "Learning".into(),
                    highlights: strings(&[
                        "TypeScript",
                        "Next.js",
                        "Python",
                        "Node.js",
                        "Agentic AI",
                    ]),
                },
            ],
            skills: Skills {
                frontend: strings(&[
                    "Next.js",
                    "TypeScript",
                    "React",
                    "Tailwind CSS",
                    "Framer Motion",
                ]),
                backend: strings(&[
                    "Node.js",
                    "Express.js",
                    "Prisma",
                    "PostgreSQL",
                    "REST APIs",
                ]),
                ai_devops: strings(&[
                    "Python",
                    "OpenAI SDK",
                    "Gemini API",
                    "FastAPI",
                    "Agentic AI",
                ]),
                tools: strings(&[
                    "Git",
                    "GitHub",
                    "Vercel",
                    "Supabase",
                    "Passport.js",
                    "ShadCN UI",
                ]),
            },
            projects: vec![
                Project {
                    name: "AuthApp Sage".into(),
                    description: "Modern authentication system with OAuth integration".into(),
                    tech: strings(&["Next.js", "TypeScript", "Supabase", "OAuth"]),
                },
                Project {
                    name: "RameezBot".into(),
                    description: "AI-powered chatbot with RAG (Retrieval Augmented Generation)"
                        .into(),
                    tech: strings(&["Gemini API", "Vector Embeddings", "Next.js"]),
                },
                Project {
                    name: "Full-Stack Applications".into(),
                    description: "Enterprise-level apps with complete CRUD operations".into(),
                    tech: strings(&["Next.js", "Express", "Prisma", "PostgreSQL"]),
                },
            ],
            interests: strings(&[
                "Building interactive UIs",
                "Exploring Agentic AI with OpenAI and Gemini APIs",
                "Working with Express.js and databases",
                "Cloud deployments",
                "Cybersecurity",
                "Learning new frameworks",
            ]),
            contact: Contact {
                email: "rameezbaderkhwaja@gmail.com".into(),
                github: Some("github.com/RameezBadruddinKhwaja".into()),
                linkedin: Some("linkedin.com/in/rameezbaderkhwaja".into()),
            },
        }
    }
}

impl SiteProfile {
    /// Load a profile from a YAML (or JSON, which is valid YAML) file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let profile: Self = serde_yaml::from_str(&contents).map_err(|e| {
            Error::Config(format!("failed to parse profile {}: {e}", path.display()))
        })?;
        info!("loaded site profile from {}", path.display());
        Ok(profile)
    }

    /// Built-in profile unless `path` names a file to load instead.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn short_name(&self) -> &str {
        self.about
            .short_name
            .as_deref()
            .or_else(|| self.about.name.split_whitespace().next())
            .unwrap_or(self.about.name.as_str())
    }

    /// Plain-text rendering of one profile section.
    pub fn section(&self, topic: Topic) -> String {
        let who = self.short_name();
        match topic {
            Topic::Skills => format!(
                "{who}'s technical skills include:\n\n\
                 **Frontend:** {}\n\
                 **Backend:** {}\n\
                 **AI & DevOps:** {}\n\
                 **Tools:** {}",
                self.skills.frontend.join(", "),
                self.skills.backend.join(", "),
                self.skills.ai_devops.join(", "),
                self.skills.tools.join(", "),
            ),
            Topic::Projects => {
                let projects = self
                    .projects
                    .iter()
                    .enumerate()
                    .map(|(i, p)| {
                        format!(
                            "{}. **{}**: {}\n   Tech: {}",
                            i + 1,
                            p.name,
                            p.description,
                            p.tech.join(", ")
                        )
                    })
                    .collect::<Vec<_>>()
                    .join("\n\n");
                format!("{who}'s notable projects:\n\n{projects}")
            }
            Topic::Education => {
                let entries = self
                    .education
                    .iter()
                    .map(|e| {
                        let heading = match &e.institution {
                            Some(institution) => format!("{} from {institution}", e.name),
                            None => e.name.clone(),
                        };
                        format!(
                            "• {heading}\n  {}: {}",
                            e.highlights_label,
                            e.highlights.join(", ")
                        )
                    })
                    .collect::<Vec<_>>()
                    .join("\n\n");
                format!("{who}'s education:\n\n{entries}")
            }
            Topic::About => format!(
                "{} is a {} based in {}.\n\n{}",
                self.about.name, self.about.title, self.about.location, self.about.bio
            ),
            Topic::Contact => {
                let mut lines = vec![format!("📧 Email: {}", self.contact.email)];
                if let Some(linkedin) = &self.contact.linkedin {
                    lines.push(format!("💼 LinkedIn: {linkedin}"));
                }
                if let Some(github) = &self.contact.github {
                    lines.push(format!("🐙 GitHub: {github}"));
                }
                format!("You can reach {who} at:\n\n{}", lines.join("\n"))
            }
            Topic::Interests => format!("{who} enjoys:\n• {}", self.interests.join("\n• ")),
        }
    }
}
